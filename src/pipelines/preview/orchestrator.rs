// SPDX-License-Identifier: GPL-3.0-only

//! Capture callback: convert, process, measure
//!
//! [`Orchestrator::on_frame`] runs on the source's capture worker for every
//! delivered frame. A frame that arrives while another is still being
//! processed is released immediately; nothing is queued.

use super::busy_guard::BusyFlag;
use super::fps::FpsMeter;
use crate::backends::camera::{CapturedFrame, FormatConverter};
use crate::constants::timing;
use crate::engine::ProcessingBridge;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What happened to one delivered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Converted and processed successfully
    Processed,
    /// Another frame was in flight; released without work
    DroppedBusy,
    /// The pipeline is not admitting frames (stopping)
    Rejected,
    /// Plane sizes did not match the frame dimensions
    Malformed,
    /// The engine returned an error status
    Failed,
}

/// Orchestrator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub delivered: u64,
    pub processed: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    malformed: AtomicU64,
    failed: AtomicU64,
}

/// First occurrence and then every `FRAME_LOG_INTERVAL`th
fn periodic_log_due(count: u64) -> bool {
    count % timing::FRAME_LOG_INTERVAL == 1
}

pub struct Orchestrator {
    bridge: Arc<ProcessingBridge>,
    busy: BusyFlag,
    admitting: AtomicBool,
    converter: Mutex<FormatConverter>,
    meter: Mutex<FpsMeter>,
    fps: watch::Sender<u32>,
    counters: Counters,
}

impl Orchestrator {
    /// New orchestrator, admitting frames
    pub fn new(bridge: Arc<ProcessingBridge>) -> Self {
        let (fps, _) = watch::channel(0);
        Self {
            bridge,
            busy: BusyFlag::new(),
            admitting: AtomicBool::new(true),
            converter: Mutex::new(FormatConverter::new()),
            meter: Mutex::new(FpsMeter::new()),
            fps,
            counters: Counters::default(),
        }
    }

    /// Handle one delivered frame
    ///
    /// The frame is released before this returns, on every path.
    pub fn on_frame(&self, frame: CapturedFrame) -> FrameOutcome {
        let n = self.counters.delivered.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.admitting.load(Ordering::Acquire) {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            frame.release();
            return FrameOutcome::Rejected;
        }

        let Some(_in_flight) = self.busy.try_acquire() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(frame = frame.sequence, "Frame dropped, previous still in flight");
            frame.release();
            return FrameOutcome::DroppedBusy;
        };

        let mut converter = self.converter.lock().unwrap_or_else(PoisonError::into_inner);
        let canonical = match converter.convert(frame.planes(), frame.width, frame.height) {
            Ok(canonical) => canonical,
            Err(e) => {
                let malformed = self.counters.malformed.fetch_add(1, Ordering::Relaxed) + 1;
                if periodic_log_due(malformed) {
                    warn!(frame = frame.sequence, malformed, error = %e, "Dropping malformed frame");
                }
                frame.release();
                self.poll_fps();
                return FrameOutcome::Malformed;
            }
        };

        let result = self.bridge.process(
            canonical.as_bytes(),
            frame.width,
            frame.height,
            frame.rotation,
            canonical.format().is_planar(),
        );
        converter.recycle(canonical);
        drop(converter);

        let outcome = match result {
            Ok(()) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                let rate = self
                    .meter
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(Instant::now());
                if let Some(rate) = rate {
                    self.publish(rate);
                }
                FrameOutcome::Processed
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                debug!(frame = frame.sequence, error = %e, "Frame not processed");
                self.poll_fps();
                FrameOutcome::Failed
            }
        };

        if n % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frame = frame.sequence,
                latency_us = frame.captured_at.elapsed().as_micros() as u64,
                stats = ?self.stats(),
                "Pipeline progress"
            );
        }

        frame.release();
        outcome
    }

    fn publish(&self, rate: u32) {
        self.fps.send_replace(rate);
        debug!(fps = rate, "FPS window closed");
    }

    /// Close an elapsed FPS window even if no frame completed in it
    pub fn poll_fps(&self) {
        let rate = self
            .meter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .poll(Instant::now());
        if let Some(rate) = rate {
            self.publish(rate);
        }
    }

    /// Receiver for the published FPS (integer, truncated)
    pub fn subscribe_fps(&self) -> watch::Receiver<u32> {
        self.fps.subscribe()
    }

    /// Last published FPS
    pub fn fps(&self) -> u32 {
        *self.fps.borrow()
    }

    /// Publish 0 and start a fresh measurement window
    pub fn reset_fps(&self) {
        self.meter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset(Instant::now());
        self.fps.send_replace(0);
    }

    pub fn stop_admitting(&self) {
        self.admitting.store(false, Ordering::Release);
        info!("Orchestrator stopped admitting frames");
    }

    pub fn resume_admitting(&self) {
        self.admitting.store(true, Ordering::Release);
    }

    pub fn is_admitting(&self) -> bool {
        self.admitting.load(Ordering::Acquire)
    }

    /// Whether a frame is being converted or processed right now
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Wait until no frame is in flight, up to `timeout`
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.busy.is_busy() {
            if Instant::now() >= deadline {
                warn!("Timed out waiting for in-flight frame");
                return false;
            }
            std::thread::sleep(timing::DRAIN_POLL);
        }
        true
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            malformed: self.counters.malformed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}
