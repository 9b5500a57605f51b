// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Capture pipeline constants
pub mod pipeline {
    /// Frame buffers a source may have outstanding before it starts dropping captures
    pub const DEFAULT_FRAME_SLOTS: usize = 3;

    /// Lower bound for configured frame slots (one in the slot, one in flight)
    pub const MIN_FRAME_SLOTS: usize = 2;

    /// Upper bound for configured frame slots
    pub const MAX_FRAME_SLOTS: usize = 8;

    /// Maximum buffer queue size on the appsink (keep-latest)
    pub const MAX_BUFFERS: u32 = 1;

    /// Default capture resolution
    pub const DEFAULT_WIDTH: u32 = 640;
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Default capture framerate
    pub const DEFAULT_FRAMERATE: u32 = 30;
}

/// Engine constants
pub mod engine {
    /// Largest frame edge the software engine accepts
    pub const MAX_DIMENSION: u32 = 8192;

    /// Sobel gradient magnitude at or above which a pixel is an edge
    pub const EDGE_THRESHOLD: u32 = 100;
}

/// FPS measurement constants
pub mod fps {
    use super::Duration;

    /// Length of one FPS measurement window
    pub const WINDOW: Duration = Duration::from_millis(1000);
}

/// Render loop constants
pub mod render {
    /// Default redraw rate of the render surface
    pub const DEFAULT_RENDER_FPS: u32 = 60;

    /// Convert a redraw rate into a tick interval
    pub fn interval_for_fps(fps: u32) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / u64::from(fps.max(1)))
    }
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// How long the capture worker waits for a frame before re-checking its stop signal
    pub const DELIVERY_WAIT: Duration = Duration::from_millis(50);

    /// Poll interval while waiting for the in-flight frame on shutdown
    pub const DRAIN_POLL: Duration = Duration::from_millis(1);

    /// Terminal input poll timeout (also bounds UI refresh latency)
    pub const UI_POLL: Duration = Duration::from_millis(16);
}

/// Resolution labels for status display
pub fn get_resolution_label(width: u32) -> Option<&'static str> {
    match width {
        w if w >= 7680 => Some("8K"), // 7680x4320
        w if w >= 3840 => Some("4K"), // 3840x2160
        w if w >= 2560 => Some("2K"), // 2560x1440
        w if w >= 1920 => Some("HD"), // 1920x1080
        w if w >= 640 => Some("SD"),  // 640x480
        _ => None,
    }
}

/// Application information
pub mod app_info {
    /// Application name used for config and cache directories
    pub const APP_DIR: &str = "edgecam";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
