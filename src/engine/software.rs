// SPDX-License-Identifier: GPL-3.0-only

//! CPU reference engine
//!
//! Passthrough converts the canonical frame to RGBA. Edge mode runs a 3x3
//! Sobel operator over luma and thresholds the gradient magnitude into a
//! white-on-black edge map. The result is rotated upright and kept until the
//! next `draw` presents it.

use super::mode::{ModeCell, RenderMode};
use super::{
    Engine, Picture, Presenter, STATUS_INVALID_BUFFER, STATUS_NOT_INITIALIZED, STATUS_OK,
    STATUS_UNSUPPORTED_DIMENSIONS,
};
use crate::backends::camera::SensorRotation;
use crate::backends::camera::format_converters::{canonical_len, canonical_to_rgba, rgba_to_luma, rotate_rgba};
use crate::constants::engine::{EDGE_THRESHOLD, MAX_DIMENSION};
use crate::pipelines::preview::fps::FpsMeter;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct EngineState {
    initialized: bool,
    /// Result of the last successful `process`
    latest: Option<Picture>,
}

pub struct SoftwareEngine {
    mode: ModeCell,
    presenter: Arc<Presenter>,
    state: Mutex<EngineState>,
    meter: Mutex<FpsMeter>,
    /// Last measured rate, f32 bits
    fps_bits: AtomicU32,
    edge_threshold: u32,
}

impl SoftwareEngine {
    pub fn new(presenter: Arc<Presenter>) -> Self {
        Self {
            mode: ModeCell::new(RenderMode::Passthrough),
            presenter,
            state: Mutex::new(EngineState::default()),
            meter: Mutex::new(FpsMeter::new()),
            fps_bits: AtomicU32::new(0f32.to_bits()),
            edge_threshold: EDGE_THRESHOLD,
        }
    }

    pub fn with_edge_threshold(mut self, threshold: u32) -> Self {
        self.edge_threshold = threshold;
        self
    }

    /// Mode the engine will use for the next frame
    pub fn mode(&self) -> RenderMode {
        self.mode.load()
    }

    pub fn presenter(&self) -> &Arc<Presenter> {
        &self.presenter
    }

    fn render(&self, pixels: &[u8], width: u32, height: u32, is_planar: bool) -> Result<Vec<u8>, i32> {
        let pixel_count = width as usize * height as usize;
        let mode = self.mode.load();

        if is_planar {
            if pixels.len() != canonical_len(width, height) {
                return Err(STATUS_INVALID_BUFFER);
            }
            match mode {
                // Canonical buffers start with the luma plane
                RenderMode::ProcessedEdges => {
                    Ok(sobel_edges(&pixels[..pixel_count], width, height, self.edge_threshold))
                }
                RenderMode::Passthrough => {
                    canonical_to_rgba(pixels, width, height).ok_or(STATUS_INVALID_BUFFER)
                }
            }
        } else {
            if pixels.len() != pixel_count * 4 {
                return Err(STATUS_INVALID_BUFFER);
            }
            match mode {
                RenderMode::ProcessedEdges => Ok(sobel_edges(
                    &rgba_to_luma(pixels),
                    width,
                    height,
                    self.edge_threshold,
                )),
                RenderMode::Passthrough => Ok(pixels.to_vec()),
            }
        }
    }

    fn record_completion(&self) {
        let mut meter = self.meter.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rate) = meter.record(Instant::now()) {
            self.fps_bits.store((rate as f32).to_bits(), Ordering::Relaxed);
        }
    }
}

impl Engine for SoftwareEngine {
    fn initialize(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // Anything computed for the previous surface is gone
        state.latest = None;
        state.initialized = true;
        self.presenter.present(None);
        debug!("Software engine initialized");
    }

    fn process(&self, pixels: &[u8], width: u32, height: u32, rotation: u32, is_planar: bool) -> i32 {
        if !self.state.lock().unwrap_or_else(PoisonError::into_inner).initialized {
            return STATUS_NOT_INITIALIZED;
        }
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return STATUS_UNSUPPORTED_DIMENSIONS;
        }
        if rotation % 90 != 0 {
            warn!(rotation, "Unsupported rotation");
            return STATUS_INVALID_BUFFER;
        }

        let rgba = match self.render(pixels, width, height, is_planar) {
            Ok(rgba) => rgba,
            Err(status) => return status,
        };
        let rotation = SensorRotation::from_degrees_int(rotation as i32);
        let (rgba, width, height) = rotate_rgba(&rgba, width, height, rotation);

        self.state.lock().unwrap_or_else(PoisonError::into_inner).latest = Some(Picture {
            width,
            height,
            rgba: Arc::from(rgba),
        });
        self.record_completion();
        STATUS_OK
    }

    fn draw(&self) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.initialized {
            return;
        }
        self.presenter.present(state.latest.clone());
    }

    fn set_mode(&self, mode: i32) {
        match RenderMode::from_code(mode) {
            Some(mode) => self.mode.store(mode),
            None => warn!(mode, "Ignoring unknown render mode"),
        }
    }

    fn fps(&self) -> f32 {
        f32::from_bits(self.fps_bits.load(Ordering::Relaxed))
    }
}

/// Sobel gradient magnitude thresholded to an RGBA edge map
///
/// Border pixels are never edges.
fn sobel_edges(luma: &[u8], width: u32, height: u32, threshold: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut out = vec![0u8; w * h * 4];
    for px in out.chunks_exact_mut(4) {
        px[3] = 255;
    }

    let at = |x: usize, y: usize| luma[y * w + x] as i32;
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let gx = at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2 * at(x - 1, y)
                - at(x - 1, y + 1);
            let gy = at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2 * at(x, y - 1)
                - at(x + 1, y - 1);
            // |gx| + |gy| approximates the magnitude
            if gx.unsigned_abs() + gy.unsigned_abs() >= threshold {
                let idx = (y * w + x) * 4;
                out[idx..idx + 3].fill(255);
            }
        }
    }
    out
}
