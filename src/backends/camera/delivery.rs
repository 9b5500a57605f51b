// SPDX-License-Identifier: GPL-3.0-only

//! Keep-latest hand-off between a source's producer and its capture worker
//!
//! The producer (GStreamer streaming thread or test pattern clock) publishes
//! into a [`LatestFrameSlot`]. A single capture worker owned by
//! [`FrameDelivery`] takes frames out and runs the consumer callback, so
//! callbacks are serialized and a slow consumer never queues frames: an
//! undelivered frame is simply replaced by the next one.

use super::frame_loop::{LoopAction, LoopController};
use super::types::{CapturedFrame, FrameCallback, SourceCounters};
use crate::constants::timing;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// Single-slot mailbox holding the newest undelivered frame
#[derive(Debug, Default)]
pub struct LatestFrameSlot {
    frame: Mutex<Option<CapturedFrame>>,
    ready: Condvar,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, returning the undelivered frame it replaced
    ///
    /// The caller decides how to account for the superseded frame; dropping
    /// it releases its buffer slot.
    pub fn publish(&self, frame: CapturedFrame) -> Option<CapturedFrame> {
        let previous = self
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(frame);
        self.ready.notify_one();
        previous
    }

    /// Take the pending frame, waiting up to `timeout` for one to arrive
    pub fn take_timeout(&self, timeout: Duration) -> Option<CapturedFrame> {
        let guard = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |frame| frame.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    /// Whether a frame is waiting
    pub fn is_pending(&self) -> bool {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Release any pending frame
    pub fn clear(&self) -> bool {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}

/// Producer side of a [`FrameDelivery`]
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    slot: Arc<LatestFrameSlot>,
    counters: Arc<SourceCounters>,
}

impl DeliveryHandle {
    /// Offer a frame to the worker; a frame still waiting is dropped
    pub fn offer(&self, frame: CapturedFrame) {
        if let Some(stale) = self.slot.publish(frame) {
            debug!(sequence = stale.sequence, "Replaced undelivered frame");
            self.counters.record_dropped();
        }
    }

    /// Count a capture that never became a frame (no free buffer slot)
    pub fn record_dropped(&self) {
        self.counters.record_dropped();
    }

    /// Count a capture and get its sequence number
    pub fn next_sequence(&self) -> u64 {
        self.counters.record_captured()
    }
}

/// Capture worker thread draining a [`LatestFrameSlot`] into a callback
pub struct FrameDelivery {
    slot: Arc<LatestFrameSlot>,
    counters: Arc<SourceCounters>,
    worker: LoopController,
}

impl FrameDelivery {
    /// Spawn the capture worker
    pub fn start(
        name: &str,
        counters: Arc<SourceCounters>,
        mut callback: FrameCallback,
    ) -> std::io::Result<Self> {
        let slot = Arc::new(LatestFrameSlot::new());
        let worker_slot = Arc::clone(&slot);
        let worker_counters = Arc::clone(&counters);

        let worker = LoopController::start(name, move || {
            if let Some(frame) = worker_slot.take_timeout(timing::DELIVERY_WAIT) {
                trace!(sequence = frame.sequence, "Delivering frame");
                worker_counters.record_delivered();
                callback(frame);
            }
            LoopAction::Continue
        })?;

        Ok(Self {
            slot,
            counters,
            worker,
        })
    }

    /// Offer a frame to the worker; a frame still waiting is dropped
    pub fn offer(&self, frame: CapturedFrame) {
        self.handle().offer(frame);
    }

    /// Cloneable producer-side handle for threads the source does not own
    pub fn handle(&self) -> DeliveryHandle {
        DeliveryHandle {
            slot: Arc::clone(&self.slot),
            counters: Arc::clone(&self.counters),
        }
    }

    /// Stop the worker and release anything still pending
    ///
    /// A callback already running is allowed to finish before this returns,
    /// unless called from inside that callback.
    pub fn stop(&mut self) {
        self.worker.stop();
        if self.slot.clear() {
            self.counters.record_dropped();
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

impl Drop for FrameDelivery {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::buffer_pool::FramePool;
    use crate::backends::camera::types::SensorRotation;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Instant;

    fn frame(pool: &FramePool, sequence: u64) -> CapturedFrame {
        CapturedFrame::filled_with(pool, 2, 2, SensorRotation::None, sequence, |y, _, _| {
            y.fill(sequence as u8)
        })
        .unwrap()
    }

    #[test]
    fn test_slot_keeps_latest() {
        let pool = FramePool::new(4);
        let slot = LatestFrameSlot::new();
        assert!(slot.publish(frame(&pool, 1)).is_none());
        let replaced = slot.publish(frame(&pool, 2)).unwrap();
        assert_eq!(replaced.sequence, 1);
        drop(replaced);

        let taken = slot.take_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(taken.sequence, 2);
        assert!(!slot.is_pending());
        drop(taken);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_take_times_out_when_empty() {
        let slot = LatestFrameSlot::new();
        let start = Instant::now();
        assert!(slot.take_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_worker_delivers_and_counts_drops() {
        let pool = FramePool::new(4);
        let counters = Arc::new(SourceCounters::default());
        let last_seen = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&last_seen);

        let mut delivery = FrameDelivery::start(
            "test-delivery",
            Arc::clone(&counters),
            Box::new(move |f: CapturedFrame| {
                seen.store(f.sequence, Ordering::SeqCst);
                f.release();
            }),
        )
        .unwrap();

        delivery.offer(frame(&pool, 5));
        let deadline = Instant::now() + Duration::from_secs(2);
        while last_seen.load(Ordering::SeqCst) != 5 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        delivery.stop();

        assert_eq!(last_seen.load(Ordering::SeqCst), 5);
        assert_eq!(counters.snapshot().delivered, 1);
        assert_eq!(pool.outstanding(), 0);
    }
}
