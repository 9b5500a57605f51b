// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing available cameras
//! - Headless pipeline benchmark against the test pattern

use edgecam::backends::virtual_camera::TestPatternSource;
use edgecam::engine::{Engine, Presenter, RenderMode, SoftwareEngine};
use edgecam::errors::AppResult;
use edgecam::pipelines::preview::{Consent, PreviewSession, SessionOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// List all available cameras
#[cfg(feature = "pipewire")]
pub fn list_cameras() -> AppResult<()> {
    use edgecam::backends::camera::pipewire::enumerate_cameras;

    let cameras = enumerate_cameras()?;
    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Path: {}", camera.path);
        if camera.rotation.degrees() != 0 {
            println!("      Rotation: {}", camera.rotation);
        }
        println!();
    }

    Ok(())
}

#[cfg(not(feature = "pipewire"))]
pub fn list_cameras() -> AppResult<()> {
    Err("Camera support is not compiled in (build with --features pipewire)".into())
}

/// Engine wrapper that makes every `process` take at least `delay`
struct SlowEngine {
    inner: SoftwareEngine,
    delay: Duration,
}

impl Engine for SlowEngine {
    fn initialize(&self) {
        self.inner.initialize();
    }

    fn process(&self, pixels: &[u8], width: u32, height: u32, rotation: u32, is_planar: bool) -> i32 {
        let start = Instant::now();
        let status = self.inner.process(pixels, width, height, rotation, is_planar);
        if let Some(rest) = self.delay.checked_sub(start.elapsed()) {
            std::thread::sleep(rest);
        }
        status
    }

    fn draw(&self) {
        self.inner.draw();
    }

    fn set_mode(&self, mode: i32) {
        self.inner.set_mode(mode);
    }

    fn fps(&self) -> f32 {
        self.inner.fps()
    }
}

/// Run the pipeline headless and report throughput
pub fn bench(
    seconds: u64,
    fps: u32,
    process_delay_ms: u64,
    mode: RenderMode,
    mut options: SessionOptions,
) -> AppResult<()> {
    options.source.framerate = edgecam::backends::camera::Framerate::from_int(fps.max(1));
    let (width, height) = (options.source.width, options.source.height);

    let engine = SlowEngine {
        inner: SoftwareEngine::new(Arc::new(Presenter::new())),
        delay: Duration::from_millis(process_delay_ms),
    };
    let mut session = PreviewSession::new(Box::new(TestPatternSource::new()), Arc::new(engine), options)?;
    session.surface_created(width, height);
    if mode != session.mode() {
        session.toggle_mode();
    }
    session.start(Consent::Granted)?;

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| e.to_string())?;

    let label = edgecam::constants::get_resolution_label(width)
        .map(|l| format!(" ({})", l))
        .unwrap_or_default();
    println!(
        "Benchmark: {}x{}{} @ {} fps, {} ms per frame, mode {}",
        width, height, label, fps, process_delay_ms, mode
    );

    let start = Instant::now();
    let target = Duration::from_secs(seconds);
    let mut last_print = Instant::now();
    while start.elapsed() < target {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
        if last_print.elapsed() >= Duration::from_secs(1) {
            last_print = Instant::now();
            println!("  FPS: {}", session.fps());
        }
    }

    let elapsed = start.elapsed();
    session.shutdown();
    let stats = session.stats();
    let rate = stats.pipeline.processed as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!();
    println!("Captured:  {}", stats.source.captured);
    println!("Delivered: {}", stats.pipeline.delivered);
    println!("Processed: {}", stats.pipeline.processed);
    println!(
        "Dropped:   {} busy, {} at source",
        stats.pipeline.dropped, stats.source.dropped
    );
    println!("Failed:    {}", stats.pipeline.failed);
    println!("Draws:     {}", stats.render_draws);
    println!("Average:   {:.1} frames/s over {:.1}s", rate, elapsed.as_secs_f64());

    Ok(())
}
