// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera source
//!
//! Stands in for a physical camera when none is available and drives the
//! benchmarks and tests. It behaves like a real source: frames come from a
//! producer running on its own clock, go through a bounded pool and the
//! keep-latest slot, and are delivered on a capture worker thread.
//!
//! ```text
//! test-pattern thread (paced at framerate)
//!        │  FramePool slot, dropped if none free
//!        ▼
//! LatestFrameSlot → capture-worker → FrameCallback
//! ```

mod pattern;

pub use pattern::fill_i420;

use crate::backends::camera::frame_loop::{LoopAction, LoopController};
use crate::backends::camera::{
    CapturedFrame, FrameCallback, FrameDelivery, FramePool, FrameSource, SensorRotation,
    SourceConfig, SourceCounters, SourceStats,
};
use crate::constants::timing;
use crate::errors::{PipelineError, PipelineResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Test pattern frame source
pub struct TestPatternSource {
    name: String,
    rotation: SensorRotation,
    /// Set when the source pretends the device cannot be opened
    unavailable: Option<String>,
    counters: Arc<SourceCounters>,
    producer: Option<LoopController>,
    delivery: Option<FrameDelivery>,
}

impl TestPatternSource {
    pub fn new() -> Self {
        Self {
            name: "Test pattern".to_string(),
            rotation: SensorRotation::None,
            unavailable: None,
            counters: Arc::new(SourceCounters::default()),
            producer: None,
            delivery: None,
        }
    }

    /// A source whose `start` always fails with `DeviceUnavailable`
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let mut source = Self::new();
        source.unavailable = Some(reason.into());
        source
    }

    /// Rotation attached to every frame
    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

impl Default for TestPatternSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for TestPatternSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, config: &SourceConfig, callback: FrameCallback) -> PipelineResult<()> {
        if let Some(reason) = &self.unavailable {
            warn!(source = %self.name, reason = %reason, "Test pattern device unavailable");
            return Err(PipelineError::DeviceUnavailable(reason.clone()));
        }
        self.stop();

        let interval = config
            .framerate
            .frame_interval()
            .unwrap_or(Duration::from_secs(1));
        let (width, height) = (config.width.max(1), config.height.max(1));
        let rotation = self.rotation;
        let pool = FramePool::new(config.frame_slots);

        let mut delivery = FrameDelivery::start("capture-worker", Arc::clone(&self.counters), callback)
            .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;
        let handle = delivery.handle();

        let producer = LoopController::start_paced("test-pattern", interval, move || {
            let sequence = handle.next_sequence();
            let frame = CapturedFrame::filled_with(&pool, width, height, rotation, sequence, |y, u, v| {
                fill_i420(y, u, v, width, height, sequence)
            });
            match frame {
                Some(frame) => handle.offer(frame),
                None => {
                    if sequence % timing::FRAME_LOG_INTERVAL == 0 {
                        debug!(frame = sequence, "No free frame slot, dropping capture");
                    }
                    handle.record_dropped();
                }
            }
            LoopAction::Continue
        });

        let producer = match producer {
            Ok(p) => p,
            Err(e) => {
                delivery.stop();
                return Err(PipelineError::DeviceUnavailable(e.to_string()));
            }
        };

        info!(
            source = %self.name,
            width,
            height,
            framerate = %config.framerate,
            slots = config.frame_slots,
            "Test pattern source started"
        );
        self.producer = Some(producer);
        self.delivery = Some(delivery);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            producer.stop();
        }
        if let Some(mut delivery) = self.delivery.take() {
            delivery.stop();
            info!(source = %self.name, stats = ?self.counters.snapshot(), "Test pattern source stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.producer.as_ref().is_some_and(|p| p.is_running())
    }

    fn stats(&self) -> SourceStats {
        self.counters.snapshot()
    }
}

impl Drop for TestPatternSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::Framerate;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn config(fps: u32) -> SourceConfig {
        SourceConfig {
            width: 32,
            height: 24,
            framerate: Framerate::from_int(fps),
            ..SourceConfig::default()
        }
    }

    #[test]
    fn test_unavailable_source_never_delivers() {
        let delivered = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&delivered);
        let mut source = TestPatternSource::unavailable("busy");

        let result = source.start(
            &config(30),
            Box::new(move |_: CapturedFrame| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(matches!(result, Err(PipelineError::DeviceUnavailable(_))));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        assert!(!source.is_running());
    }

    #[test]
    fn test_frames_delivered_with_rotation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut source = TestPatternSource::new().with_rotation(SensorRotation::Rotate90);

        source
            .start(
                &config(100),
                Box::new(move |frame: CapturedFrame| {
                    sink.lock().unwrap().push((frame.rotation, frame.data().len()));
                }),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(150));
        source.stop();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&(r, len)| r == SensorRotation::Rotate90 && len == 32 * 24 * 3 / 2));
        assert!(!source.is_running());
    }

    #[test]
    fn test_unreleased_frames_exhaust_slots() {
        let held = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&held);
        let mut source = TestPatternSource::new();
        let cfg = SourceConfig {
            frame_slots: 2,
            ..config(200)
        };

        source
            .start(&cfg, Box::new(move |frame: CapturedFrame| sink.lock().unwrap().push(frame)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(150));
        source.stop();

        let stats = source.stats();
        assert!(held.lock().unwrap().len() <= 2);
        assert!(stats.dropped > 0);
        assert!(stats.delivered <= 2);
    }
}
