// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use edgecam::constants::{fps, pipeline, render, timing};
use std::time::Duration;

#[test]
fn test_fps_window_is_one_second() {
    assert_eq!(fps::WINDOW, Duration::from_millis(1000));
}

#[test]
fn test_frame_slot_bounds() {
    assert!(pipeline::MIN_FRAME_SLOTS >= 2);
    assert!(pipeline::MIN_FRAME_SLOTS <= pipeline::DEFAULT_FRAME_SLOTS);
    assert!(pipeline::DEFAULT_FRAME_SLOTS <= pipeline::MAX_FRAME_SLOTS);
}

#[test]
fn test_default_render_rate_outpaces_capture() {
    assert!(render::DEFAULT_RENDER_FPS >= pipeline::DEFAULT_FRAMERATE);
    assert!(
        render::interval_for_fps(render::DEFAULT_RENDER_FPS) < Duration::from_millis(20),
        "Render interval should be short enough for smooth redraws"
    );
}

#[test]
fn test_delivery_wait_bounds_stop_latency() {
    assert!(timing::DELIVERY_WAIT < Duration::from_secs(timing::STOP_TIMEOUT_SECS));
}
