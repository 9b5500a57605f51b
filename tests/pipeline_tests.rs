// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the preview pipeline

use edgecam::backends::camera::format_converters::convert;
use edgecam::backends::camera::{CapturedFrame, FramePool, Framerate, SensorRotation, YuvPlanes};
use edgecam::backends::virtual_camera::TestPatternSource;
use edgecam::engine::{Engine, ModeController, ProcessingBridge, RenderMode, STATUS_OK};
use edgecam::errors::PipelineError;
use edgecam::pipelines::preview::{
    Consent, FrameOutcome, Orchestrator, PreviewSession, SessionEvent, SessionOptions,
};
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Engine double that records every call and checks for overlapping work
#[derive(Default)]
struct RecordingEngine {
    delay: Duration,
    status: AtomicI32,
    inside: AtomicUsize,
    max_inside: AtomicUsize,
    initializations: AtomicU64,
    processed: AtomicU64,
    mode: AtomicI32,
    set_modes: Mutex<Vec<i32>>,
    modes_processed: Mutex<Vec<i32>>,
}

impl RecordingEngine {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn enter(&self) {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inside.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Engine for RecordingEngine {
    fn initialize(&self) {
        self.initializations.fetch_add(1, Ordering::SeqCst);
    }

    fn process(&self, _: &[u8], _: u32, _: u32, _: u32, _: bool) -> i32 {
        self.enter();
        self.modes_processed
            .lock()
            .unwrap()
            .push(self.mode.load(Ordering::SeqCst));
        std::thread::sleep(self.delay);
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.leave();
        self.status.load(Ordering::SeqCst)
    }

    fn draw(&self) {
        self.enter();
        self.leave();
    }

    fn set_mode(&self, mode: i32) {
        self.mode.store(mode, Ordering::SeqCst);
        self.set_modes.lock().unwrap().push(mode);
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn options(fps: u32) -> SessionOptions {
    let mut options = SessionOptions::default();
    options.source.width = 64;
    options.source.height = 48;
    options.source.framerate = Framerate::from_int(fps);
    options.render_interval = Duration::from_millis(10);
    options
}

fn live_session(engine: &Arc<RecordingEngine>, fps: u32) -> PreviewSession {
    let mut session = PreviewSession::new(
        Box::new(TestPatternSource::new()),
        Arc::clone(engine) as Arc<dyn Engine>,
        options(fps),
    )
    .unwrap();
    session.surface_created(64, 48);
    assert!(wait_until(Duration::from_secs(2), || {
        engine.initializations.load(Ordering::SeqCst) > 0
    }));
    session.start(Consent::Granted).unwrap();
    session
}

fn test_frame(pool: &FramePool, sequence: u64) -> CapturedFrame {
    CapturedFrame::filled_with(pool, 4, 2, SensorRotation::None, sequence, |y, u, v| {
        y.fill(16);
        u.fill(128);
        v.fill(128);
    })
    .unwrap()
}

#[test]
fn test_slow_engine_limits_rate_and_drops_frames() {
    let engine = Arc::new(RecordingEngine::with_delay(Duration::from_millis(40)));
    let mut session = live_session(&engine, 30);

    let start = Instant::now();
    std::thread::sleep(Duration::from_millis(3000));
    session.shutdown();
    let elapsed = start.elapsed();

    let stats = session.stats();
    let processed = engine.processed.load(Ordering::SeqCst);
    // A 40ms engine caps out near 25 frames per second
    let rate = processed as f64 / elapsed.as_secs_f64();
    assert!(
        (18.0..=27.0).contains(&rate),
        "processed {} in {:?} ({:.1}/s)",
        processed,
        elapsed,
        rate
    );
    assert!(
        stats.source.dropped + stats.pipeline.dropped > 0,
        "a 40ms engine cannot keep up with 30fps: {:?}",
        stats
    );
    assert_eq!(engine.max_inside.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_frames_are_dropped_while_busy() {
    let engine = Arc::new(RecordingEngine::with_delay(Duration::from_millis(100)));
    let bridge = Arc::new(ProcessingBridge::new(Arc::clone(&engine) as Arc<dyn Engine>));
    assert!(bridge.initialize());
    let orchestrator = Arc::new(Orchestrator::new(bridge));
    let pool = FramePool::new(4);

    let first = test_frame(&pool, 0);
    let worker = {
        let orchestrator = Arc::clone(&orchestrator);
        std::thread::spawn(move || orchestrator.on_frame(first))
    };
    assert!(wait_until(Duration::from_secs(1), || orchestrator.is_busy()));

    assert_eq!(orchestrator.on_frame(test_frame(&pool, 1)), FrameOutcome::DroppedBusy);
    assert_eq!(worker.join().unwrap(), FrameOutcome::Processed);
    assert!(!orchestrator.is_busy());

    let stats = orchestrator.stats();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.dropped, 1);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn test_double_toggle_sets_both_modes() {
    let engine = Arc::new(RecordingEngine::default());
    let session = PreviewSession::new(
        Box::new(TestPatternSource::new()),
        Arc::clone(&engine) as Arc<dyn Engine>,
        options(30),
    )
    .unwrap();

    assert_eq!(session.mode(), RenderMode::Passthrough);
    assert_eq!(session.toggle_mode(), RenderMode::ProcessedEdges);
    assert_eq!(session.toggle_mode(), RenderMode::Passthrough);
    assert_eq!(*engine.set_modes.lock().unwrap(), vec![0, 1, 0]);
}

#[test]
fn test_toggle_during_process_applies_to_next_frame() {
    let engine = Arc::new(RecordingEngine::with_delay(Duration::from_millis(150)));
    let bridge = Arc::new(ProcessingBridge::new(Arc::clone(&engine) as Arc<dyn Engine>));
    bridge.initialize();
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&bridge)));
    let modes = ModeController::new(bridge);
    let pool = FramePool::new(4);

    let first = test_frame(&pool, 0);
    let worker = {
        let orchestrator = Arc::clone(&orchestrator);
        std::thread::spawn(move || orchestrator.on_frame(first))
    };
    assert!(wait_until(Duration::from_secs(1), || orchestrator.is_busy()));

    // Does not wait for the frame in flight
    let toggled_at = Instant::now();
    assert_eq!(modes.toggle(), RenderMode::ProcessedEdges);
    assert!(toggled_at.elapsed() < Duration::from_millis(100));

    worker.join().unwrap();
    assert_eq!(orchestrator.on_frame(test_frame(&pool, 1)), FrameOutcome::Processed);
    assert_eq!(*engine.modes_processed.lock().unwrap(), vec![0, 1]);
}

#[test]
fn test_unavailable_device_blocks_once() {
    let engine = Arc::new(RecordingEngine::default());
    let mut session = PreviewSession::new(
        Box::new(TestPatternSource::unavailable("busy")),
        Arc::clone(&engine) as Arc<dyn Engine>,
        options(30),
    )
    .unwrap();
    let mut events = session.take_events().unwrap();

    let err = session.start(Consent::Granted).unwrap_err();
    assert!(matches!(err, PipelineError::DeviceUnavailable(_)));
    assert!(session.is_blocked());

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(engine.processed.load(Ordering::SeqCst), 0);
    assert_eq!(session.stats().source.captured, 0);

    let blocked: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, SessionEvent::CaptureBlocked(_)))
        .collect();
    assert_eq!(blocked.len(), 1);
}

#[test]
fn test_denied_consent_never_captures() {
    let engine = Arc::new(RecordingEngine::default());
    let mut session = PreviewSession::new(
        Box::new(TestPatternSource::new()),
        Arc::clone(&engine) as Arc<dyn Engine>,
        options(30),
    )
    .unwrap();
    let mut events = session.take_events().unwrap();

    assert_eq!(session.start(Consent::Denied), Err(PipelineError::ConsentDenied));
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::CaptureBlocked(PipelineError::ConsentDenied)
    );

    std::thread::sleep(Duration::from_millis(100));
    assert!(!session.is_capturing());
    assert_eq!(session.stats().source.captured, 0);

    // Granting afterwards starts capture
    session.retry_capture(Consent::Granted).unwrap();
    assert!(session.is_capturing());
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::CaptureStarted { .. }
    ));
}

#[test]
fn test_fps_published_after_first_window() {
    let engine = Arc::new(RecordingEngine::default());
    let session = live_session(&engine, 30);
    let fps = session.subscribe_fps();

    assert!(wait_until(Duration::from_secs(3), || *fps.borrow() > 0));
    let rate = *fps.borrow();
    assert!((1..=40).contains(&rate), "rate {}", rate);
}

#[test]
fn test_shutdown_releases_engine_and_zeroes_fps() {
    let engine = Arc::new(RecordingEngine::default());
    engine.status.store(STATUS_OK, Ordering::SeqCst);
    let mut session = live_session(&engine, 30);
    let mut events = session.take_events().unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        engine.processed.load(Ordering::SeqCst) > 0
    }));
    session.shutdown();

    assert_eq!(Arc::strong_count(&engine), 1);
    assert_eq!(session.fps(), 0);
    assert!(!session.is_capturing());

    let processed = engine.processed.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(engine.processed.load(Ordering::SeqCst), processed);

    let all: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(all.last(), Some(&SessionEvent::Stopped));
}

#[test]
fn test_start_after_shutdown_is_not_blocking() {
    let engine = Arc::new(RecordingEngine::default());
    let mut session = PreviewSession::new(
        Box::new(TestPatternSource::new()),
        Arc::clone(&engine) as Arc<dyn Engine>,
        options(30),
    )
    .unwrap();
    let mut events = session.take_events().unwrap();
    session.shutdown();

    let err = session.start(Consent::Granted).unwrap_err();
    assert_eq!(err, PipelineError::SessionClosed);
    assert!(!err.is_blocking());
    assert!(!session.is_blocked());

    let all: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(!all.iter().any(|e| matches!(e, SessionEvent::CaptureBlocked(_))));
    assert_eq!(session.stats().source.captured, 0);
}

#[test]
fn test_engine_errors_are_counted_not_fatal() {
    let engine = Arc::new(RecordingEngine::default());
    engine.status.store(-1, Ordering::SeqCst);
    let mut session = live_session(&engine, 30);

    assert!(wait_until(Duration::from_secs(2), || {
        session.stats().pipeline.failed >= 3
    }));
    assert!(session.is_capturing());
    session.shutdown();
    assert_eq!(session.stats().pipeline.processed, 0);
}

#[test]
fn test_canonical_layout_puts_v_before_u() {
    let pool = FramePool::new(1);
    let frame = CapturedFrame::filled_with(&pool, 4, 4, SensorRotation::None, 0, |y, u, v| {
        y.fill(1);
        u.fill(2);
        v.fill(3);
    })
    .unwrap();

    let YuvPlanes { y, u, v } = frame.planes();
    assert_eq!((y.len(), u.len(), v.len()), (16, 4, 4));

    let canonical = convert(frame.planes(), 4, 4).unwrap();
    let bytes = canonical.as_bytes();
    assert!(bytes[..16].iter().all(|&b| b == 1));
    assert!(bytes[16..20].iter().all(|&b| b == 3));
    assert!(bytes[20..].iter().all(|&b| b == 2));
}
