// SPDX-License-Identifier: GPL-3.0-only

//! Persistent settings
//!
//! Stored as pretty JSON at `<config dir>/edgecam/config.json`. Missing
//! fields take their defaults so older files keep loading.

use crate::backends::camera::{Framerate, SourceConfig};
use crate::constants::{app_info, pipeline, render};
use crate::errors::{AppError, AppResult};
use crate::pipelines::preview::SessionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where frames come from
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum SourceKind {
    /// A PipeWire camera
    #[default]
    Camera,
    /// The built-in moving test pattern
    TestPattern,
}

impl std::str::FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "camera" => Ok(Self::Camera),
            "test-pattern" | "testpattern" | "pattern" => Ok(Self::TestPattern),
            other => Err(AppError::Config(format!("Unknown source '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame source
    pub source: SourceKind,
    /// Camera to open, in enumeration order
    pub camera_index: usize,
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Requested capture framerate
    pub framerate: u32,
    /// Render surface redraw rate
    pub render_fps: u32,
    /// Frame buffers the source may have outstanding
    pub frame_slots: usize,
    /// Log filter used when `RUST_LOG` is not set
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            camera_index: 0,
            width: pipeline::DEFAULT_WIDTH,
            height: pipeline::DEFAULT_HEIGHT,
            framerate: pipeline::DEFAULT_FRAMERATE,
            render_fps: render::DEFAULT_RENDER_FPS,
            frame_slots: pipeline::DEFAULT_FRAME_SLOTS,
            log_filter: None,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_DIR).join("config.json"))
    }

    /// Load from the default location
    ///
    /// Falls back to defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        Ok(config.validated())
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Clamp every value into a range the pipeline accepts
    pub fn validated(mut self) -> Self {
        self.width = self.width.max(1);
        self.height = self.height.max(1);
        self.framerate = self.framerate.clamp(1, 240);
        self.render_fps = self.render_fps.clamp(1, 240);
        self.frame_slots = self
            .frame_slots
            .clamp(pipeline::MIN_FRAME_SLOTS, pipeline::MAX_FRAME_SLOTS);
        self
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            width: self.width,
            height: self.height,
            framerate: Framerate::from_int(self.framerate),
            frame_slots: self.frame_slots,
            ..SourceConfig::default()
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            source: self.source_config(),
            render_interval: render::interval_for_fps(self.render_fps),
        }
    }
}
