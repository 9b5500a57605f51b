// SPDX-License-Identifier: GPL-3.0-only

//! Processing and rendering engine boundary
//!
//! The core pipeline talks to the engine only through the five operations
//! of [`Engine`]. The engine owns everything it computes; the core never
//! looks inside, it only triggers `process` (per frame) and `draw` (per
//! render tick) through [`ProcessingBridge`] and sets the mode.
//!
//! [`SoftwareEngine`] is the CPU implementation shipped with the
//! application. It presents its output to a [`Presenter`], which is the
//! drawable the terminal UI reads.

pub mod bridge;
pub mod mode;
pub mod software;

pub use bridge::{BridgeStats, ProcessingBridge};
pub use mode::{ModeCell, ModeController, RenderMode};
pub use software::SoftwareEngine;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// `process` succeeded
pub const STATUS_OK: i32 = 0;
/// Buffer size does not match the declared format and dimensions
pub const STATUS_INVALID_BUFFER: i32 = -1;
/// Width or height is zero or larger than the engine supports
pub const STATUS_UNSUPPORTED_DIMENSIONS: i32 = -2;
/// `process` called before `initialize`
pub const STATUS_NOT_INITIALIZED: i32 = -3;

/// The processing/rendering engine ABI
///
/// All operations take `&self`: implementations keep their own interior
/// state. `process` and `draw` are never called concurrently with each other
/// when driven through [`ProcessingBridge`]; `set_mode` and `fps` may be
/// called from any thread at any time.
pub trait Engine: Send + Sync {
    /// Set up resources for the current surface
    fn initialize(&self);

    /// Consume one frame synchronously
    ///
    /// `rotation` is in degrees (0, 90, 180 or 270). With `is_planar` the
    /// buffer is in the canonical Y, V, U layout, otherwise it is RGBA.
    /// Returns [`STATUS_OK`] or a negative status; the buffer is not
    /// retained after the call returns.
    fn process(&self, pixels: &[u8], width: u32, height: u32, rotation: u32, is_planar: bool) -> i32;

    /// Draw the most recent result, or a cleared surface if there is none
    fn draw(&self);

    /// Select the visual mode by its integer code
    fn set_mode(&self, mode: i32);

    /// Engine-side frame rate, if the engine measures one
    fn fps(&self) -> f32 {
        0.0
    }
}

/// One presented image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub width: u32,
    pub height: u32,
    /// RGBA, `width * height * 4` bytes
    pub rgba: Arc<[u8]>,
}

/// The drawable an engine presents to
///
/// Holds whatever was drawn last. `None` means a cleared surface.
#[derive(Debug, Default)]
pub struct Presenter {
    current: Mutex<Option<Picture>>,
    presents: AtomicU64,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the surface contents
    pub fn present(&self, picture: Option<Picture>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = picture;
        self.presents.fetch_add(1, Ordering::Relaxed);
    }

    /// Current surface contents
    pub fn snapshot(&self) -> Option<Picture> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of presents so far
    pub fn presents(&self) -> u64 {
        self.presents.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presenter_holds_last_picture() {
        let presenter = Presenter::new();
        assert!(presenter.snapshot().is_none());

        let picture = Picture {
            width: 1,
            height: 1,
            rgba: Arc::from(vec![1, 2, 3, 255]),
        };
        presenter.present(Some(picture.clone()));
        assert_eq!(presenter.snapshot(), Some(picture));

        presenter.present(None);
        assert!(presenter.snapshot().is_none());
        assert_eq!(presenter.presents(), 2);
    }
}
