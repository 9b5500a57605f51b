// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use super::buffer_pool::{FramePool, PooledBuffer};
use super::format_converters::yuv420_plane_sizes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Sensor rotation in degrees (clockwise)
///
/// Camera sensors may be physically mounted at various angles relative to the
/// display. Sources attach the rotation to every frame; the engine applies it
/// when producing the picture it draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    ///
    /// Values that are not a multiple of 90 map to `None`.
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Parse rotation from a string value (degrees)
    pub fn from_degrees(degrees: &str) -> Self {
        degrees
            .trim()
            .parse::<i32>()
            .map(Self::from_degrees_int)
            .unwrap_or_default()
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Pixel layouts that flow through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// I420 - Planar 4:2:0 (Y plane, then U, then V)
    /// What sources deliver
    I420,
    /// YV12 - Planar 4:2:0 with V before U
    /// The canonical layout handed to the engine
    YV12,
}

impl PixelFormat {
    /// Whether the format stores luma and chroma in separate planes
    pub fn is_planar(&self) -> bool {
        matches!(self, Self::I420 | Self::YV12)
    }

    /// GStreamer video/x-raw format string
    pub fn to_gst_format_string(&self) -> &'static str {
        match self {
            Self::I420 => "I420",
            Self::YV12 => "YV12",
        }
    }
}

/// Framerate as a fraction (numerator/denominator)
/// Stores exact framerate to handle NTSC rates like 59.94fps (60000/1001)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Time between two frames, `None` for a zero framerate
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        if self.num == 0 {
            return None;
        }
        Some(std::time::Duration::from_nanos(
            1_000_000_000 * u64::from(self.denom) / u64::from(self.num),
        ))
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// Represents a camera device
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Human readable name
    pub name: String,
    /// Backend-specific path (PipeWire object path or serial)
    pub path: String,
    /// Sensor rotation reported by the device
    pub rotation: SensorRotation,
}

/// Configuration applied to a source once, at start
///
/// Sources always keep only the newest undelivered frame; there is no
/// queueing mode to choose.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Pixel layout frames are delivered in
    pub output_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
    /// Buffers the source may have outstanding at once
    pub frame_slots: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        use crate::constants::pipeline;
        Self {
            output_format: PixelFormat::I420,
            width: pipeline::DEFAULT_WIDTH,
            height: pipeline::DEFAULT_HEIGHT,
            framerate: Framerate::from_int(pipeline::DEFAULT_FRAMERATE),
            frame_slots: pipeline::DEFAULT_FRAME_SLOTS,
        }
    }
}

/// Callback receiving frames on the source's capture worker
pub type FrameCallback = Box<dyn FnMut(CapturedFrame) + Send + 'static>;

/// Borrowed view of the three planes of a 4:2:0 frame
#[derive(Debug, Clone, Copy)]
pub struct YuvPlanes<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
}

impl YuvPlanes<'_> {
    /// Sum of the three plane lengths
    pub fn total_len(&self) -> usize {
        self.y.len() + self.u.len() + self.v.len()
    }
}

/// A single frame delivered by a source
///
/// The frame owns one pool slot of its source. Dropping it (or calling
/// [`CapturedFrame::release`]) hands the slot back; until then the source
/// cannot reuse that buffer.
#[derive(Debug)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub rotation: SensorRotation,
    /// Monotonic per-source sequence number
    pub sequence: u64,
    /// Timestamp when frame was captured (for latency diagnostics)
    pub captured_at: Instant,
    /// Planes packed back to back: Y, U, V
    buffer: PooledBuffer,
    y_len: usize,
    u_len: usize,
}

impl CapturedFrame {
    /// Wrap an already filled buffer with the given luma and U plane lengths;
    /// the V plane is whatever follows.
    pub fn new(
        width: u32,
        height: u32,
        rotation: SensorRotation,
        sequence: u64,
        buffer: PooledBuffer,
        y_len: usize,
        u_len: usize,
    ) -> Self {
        Self {
            width,
            height,
            rotation,
            sequence,
            captured_at: Instant::now(),
            buffer,
            y_len,
            u_len,
        }
    }

    /// Copy separate planes into a buffer from `pool`
    ///
    /// Returns `None` when the pool has no free slot.
    pub fn from_planes(
        pool: &FramePool,
        planes: YuvPlanes<'_>,
        width: u32,
        height: u32,
        rotation: SensorRotation,
        sequence: u64,
    ) -> Option<Self> {
        let mut buffer = pool.try_acquire(planes.total_len())?;
        let out = buffer.as_mut_slice();
        let (y_out, rest) = out.split_at_mut(planes.y.len());
        let (u_out, v_out) = rest.split_at_mut(planes.u.len());
        y_out.copy_from_slice(planes.y);
        u_out.copy_from_slice(planes.u);
        v_out.copy_from_slice(planes.v);
        Some(Self::new(
            width,
            height,
            rotation,
            sequence,
            buffer,
            planes.y.len(),
            planes.u.len(),
        ))
    }

    /// Allocate a tightly packed I420 frame from `pool` and let `fill` write the planes
    pub fn filled_with<F>(
        pool: &FramePool,
        width: u32,
        height: u32,
        rotation: SensorRotation,
        sequence: u64,
        fill: F,
    ) -> Option<Self>
    where
        F: FnOnce(&mut [u8], &mut [u8], &mut [u8]),
    {
        let (y_len, chroma_len) = yuv420_plane_sizes(width, height);
        let mut buffer = pool.try_acquire(y_len + 2 * chroma_len)?;
        {
            let out = buffer.as_mut_slice();
            let (y, rest) = out.split_at_mut(y_len);
            let (u, v) = rest.split_at_mut(chroma_len);
            fill(y, u, v);
        }
        Some(Self::new(
            width, height, rotation, sequence, buffer, y_len, chroma_len,
        ))
    }

    /// The luma and chroma planes of this frame
    pub fn planes(&self) -> YuvPlanes<'_> {
        let data: &[u8] = &self.buffer;
        let (y, rest) = data.split_at(self.y_len.min(data.len()));
        let (u, v) = rest.split_at(self.u_len.min(rest.len()));
        YuvPlanes { y, u, v }
    }

    /// Raw bytes of all planes
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Hand the buffer slot back to the source
    pub fn release(self) {
        drop(self);
    }
}

/// Snapshot of a source's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Frames the device produced
    pub captured: u64,
    /// Frames handed to the callback
    pub delivered: u64,
    /// Frames discarded by the source (superseded or no free slot)
    pub dropped: u64,
}

/// Live counters shared between a source's threads
#[derive(Debug, Default)]
pub struct SourceCounters {
    captured: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl SourceCounters {
    pub fn record_captured(&self) -> u64 {
        self.captured.fetch_add(1, Ordering::Relaxed)
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SourceStats {
        SourceStats {
            captured: self.captured.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
