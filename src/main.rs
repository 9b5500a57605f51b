// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use edgecam::backends::camera::FrameSource;
use edgecam::backends::virtual_camera::TestPatternSource;
use edgecam::config::{Config, SourceKind};
use edgecam::constants::app_info;
use edgecam::engine::{Presenter, RenderMode, SoftwareEngine};
use edgecam::errors::AppResult;
use edgecam::pipelines::preview::{Consent, PreviewSession};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

mod cli;

#[derive(Parser)]
#[command(name = "edgecam")]
#[command(about = "Live camera preview with a switchable edge-detection view")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Capture width (overrides config)
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Capture height (overrides config)
    #[arg(long, global = true)]
    height: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the live preview in the terminal (default)
    View {
        /// Frame source: camera or test-pattern
        #[arg(short, long)]
        source: Option<SourceKind>,

        /// Camera index to use (from 'edgecam list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Grant camera access without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// List available cameras
    List,

    /// Run the pipeline headless against the test pattern
    Bench {
        /// Run time in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,

        /// Test pattern framerate
        #[arg(short, long, default_value = "30")]
        fps: u32,

        /// Extra time each process call takes
        #[arg(short = 'd', long, default_value = "0")]
        process_delay_ms: u64,

        /// Render mode for the run
        #[arg(short, long, value_enum, default_value = "passthrough")]
        mode: BenchMode,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BenchMode {
    Passthrough,
    Edges,
}

impl From<BenchMode> for RenderMode {
    fn from(mode: BenchMode) -> Self {
        match mode {
            BenchMode::Passthrough => RenderMode::Passthrough,
            BenchMode::Edges => RenderMode::ProcessedEdges,
        }
    }
}

fn env_filter(config: &Config) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(config.log_filter.as_deref().unwrap_or("warn"))
    })
}

/// Log to stderr
fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(true)
        .with_level(true)
        .init();
}

/// Log to `<cache dir>/edgecam/edgecam.log` so the viewer owns the screen
fn init_file_logging(config: &Config) {
    let file = dirs::cache_dir()
        .map(|dir| dir.join(app_info::APP_DIR))
        .and_then(|dir| {
            std::fs::create_dir_all(&dir).ok()?;
            std::fs::File::create(dir.join("edgecam.log")).ok()
        });

    match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(env_filter(config))
            .with_target(true)
            .with_level(true)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init(),
        // Without a log file, stay quiet rather than corrupt the screen
        None => tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("off"))
            .init(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load();
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }

    match cli.command {
        Some(Commands::List) => {
            init_logging(&config);
            cli::list_cameras()?;
        }
        Some(Commands::Bench {
            seconds,
            fps,
            process_delay_ms,
            mode,
        }) => {
            init_logging(&config);
            let config = config.validated();
            cli::bench(seconds, fps, process_delay_ms, mode.into(), config.session_options())?;
        }
        Some(Commands::View {
            source,
            camera,
            yes,
        }) => {
            if let Some(source) = source {
                config.source = source;
            }
            if let Some(camera) = camera {
                config.camera_index = camera;
            }
            run_viewer(config.validated(), yes)?;
        }
        None => run_viewer(config.validated(), false)?,
    }

    Ok(())
}

/// Ask on the terminal before touching the camera
fn ask_consent() -> Consent {
    print!("Allow edgecam to access the camera? [y/N] ");
    if std::io::stdout().flush().is_err() {
        return Consent::Denied;
    }
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) if matches!(answer.trim(), "y" | "Y" | "yes" | "Yes") => Consent::Granted,
        _ => Consent::Denied,
    }
}

fn open_source(config: &Config) -> Box<dyn FrameSource> {
    match config.source {
        SourceKind::TestPattern => Box::new(TestPatternSource::new()),
        #[cfg(feature = "pipewire")]
        SourceKind::Camera => {
            match edgecam::backends::camera::pipewire::PipeWireSource::from_index(config.camera_index) {
                Ok(source) => Box::new(source),
                // Surfaces through the session as a blocked capture
                Err(e) => Box::new(TestPatternSource::unavailable(e.to_string())),
            }
        }
        #[cfg(not(feature = "pipewire"))]
        SourceKind::Camera => Box::new(TestPatternSource::unavailable(
            "Camera support is not compiled in; use --source test-pattern",
        )),
    }
}

fn run_viewer(config: Config, assume_yes: bool) -> AppResult<()> {
    let consent = if assume_yes {
        Consent::Granted
    } else {
        ask_consent()
    };
    init_file_logging(&config);
    info!(version = app_info::version(), ?consent, "Starting viewer");

    let presenter = Arc::new(Presenter::new());
    let engine = Arc::new(SoftwareEngine::new(Arc::clone(&presenter)));
    let mut session = PreviewSession::new(open_source(&config), engine, config.session_options())?;

    // A refusal is shown in the viewer, not treated as an error
    if let Err(e) = session.start(consent) {
        warn!(error = %e, "Capture not started");
    }

    edgecam::terminal::run(session, presenter)
}
