// SPDX-License-Identifier: GPL-3.0-only
// Camera backend with trait-based abstraction over frame sources

//! Camera frame sources
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  producer (device    │  ← own cadence: GStreamer streaming thread
//! │  or test pattern)    │    or a paced clock
//! └──────────┬───────────┘
//!            │ FramePool slot per capture (dropped when none is free)
//!            ▼
//! ┌──────────────────────┐
//! │   LatestFrameSlot    │  ← keeps only the newest undelivered frame
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │ capture worker       │  ← FrameDelivery, one thread, serialized
//! │ → FrameCallback      │    callbacks
//! └──────────────────────┘
//! ```
//!
//! Every frame handed to the callback holds a pool slot until it is
//! released or dropped.

pub mod buffer_pool;
pub mod delivery;
pub mod format_converters;
pub mod frame_loop;
#[cfg(feature = "pipewire")]
pub mod pipewire;
pub mod types;

pub use buffer_pool::{FramePool, PooledBuffer};
pub use delivery::{DeliveryHandle, FrameDelivery, LatestFrameSlot};
pub use format_converters::{CanonicalBuffer, FormatConverter};
pub use types::*;

use crate::errors::PipelineResult;

/// A source of camera frames
///
/// Implementations own the device (or whatever stands in for it), emit
/// frames on their own cadence and deliver them on a dedicated capture
/// worker thread, one callback at a time.
pub trait FrameSource: Send {
    /// Human readable source name for logs and the status bar
    fn name(&self) -> &str;

    /// Acquire the device and begin delivering frames to `callback`
    ///
    /// Configuration is applied once here. If the device cannot be acquired
    /// this fails with [`crate::errors::PipelineError::DeviceUnavailable`]
    /// and no frame is ever delivered.
    fn start(&mut self, config: &SourceConfig, callback: FrameCallback) -> PipelineResult<()>;

    /// Stop capture and join the capture worker
    ///
    /// After this returns no callback is running or will run. Calling stop
    /// on a stopped source does nothing.
    fn stop(&mut self);

    /// Whether the source is currently delivering frames
    fn is_running(&self) -> bool;

    /// Capture counters since the source was created
    fn stats(&self) -> SourceStats;
}
