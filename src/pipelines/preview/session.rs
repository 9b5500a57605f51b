// SPDX-License-Identifier: GPL-3.0-only

//! Preview session: wiring, consent, blocking conditions and teardown

use super::orchestrator::{Orchestrator, OrchestratorStats};
use crate::backends::camera::{CapturedFrame, FrameCallback, FrameSource, SourceConfig, SourceStats};
use crate::constants::timing;
use crate::engine::{BridgeStats, Engine, ModeController, ProcessingBridge, RenderMode};
use crate::errors::{PipelineError, PipelineResult};
use crate::render::RenderSurface;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// The user's answer to the camera access request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    Granted,
    Denied,
}

/// Notifications for the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Frames are flowing
    CaptureStarted { source: String },
    /// Capture cannot run until the user acts (grant access, free the camera)
    CaptureBlocked(PipelineError),
    /// The session has been shut down
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Capturing,
    Blocked,
    ShutDown,
}

/// Session setup
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub source: SourceConfig,
    /// Render tick interval
    pub render_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            render_interval: crate::constants::render::interval_for_fps(
                crate::constants::render::DEFAULT_RENDER_FPS,
            ),
        }
    }
}

/// Counters from every stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub source: SourceStats,
    pub pipeline: OrchestratorStats,
    pub bridge: BridgeStats,
    pub render_ticks: u64,
    pub render_draws: u64,
}

/// A running preview: source → orchestrator → bridge, plus the render loop
pub struct PreviewSession {
    source: Box<dyn FrameSource>,
    options: SessionOptions,
    orchestrator: Arc<Orchestrator>,
    bridge: Arc<ProcessingBridge>,
    render: RenderSurface,
    mode: ModeController,
    events: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    state: SessionState,
}

impl PreviewSession {
    /// Wire the pipeline and start the render loop
    ///
    /// Capture does not begin until [`PreviewSession::start`].
    pub fn new(
        source: Box<dyn FrameSource>,
        engine: Arc<dyn Engine>,
        options: SessionOptions,
    ) -> PipelineResult<Self> {
        let bridge = Arc::new(ProcessingBridge::new(engine));
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&bridge)));
        let mode = ModeController::new(Arc::clone(&bridge));
        let render = RenderSurface::start(Arc::clone(&bridge), options.render_interval)
            .map_err(|e| PipelineError::DeviceUnavailable(format!("Render thread: {}", e)))?;
        let (events, events_rx) = mpsc::unbounded_channel();

        info!(source = %source.name(), "Preview session created");
        Ok(Self {
            source,
            options,
            orchestrator,
            bridge,
            render,
            mode,
            events,
            events_rx: Some(events_rx),
            state: SessionState::Idle,
        })
    }

    /// Take the event receiver (once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Start capture if the user consented
    ///
    /// A denial or an unavailable device is reported once as
    /// [`SessionEvent::CaptureBlocked`] and returned; nothing is captured.
    pub fn start(&mut self, consent: Consent) -> PipelineResult<()> {
        match self.state {
            SessionState::Capturing => return Ok(()),
            SessionState::ShutDown => return Err(PipelineError::SessionClosed),
            SessionState::Idle | SessionState::Blocked => {}
        }

        if consent == Consent::Denied {
            return Err(self.block(PipelineError::ConsentDenied));
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        orchestrator.resume_admitting();
        let callback: FrameCallback = Box::new(move |frame: CapturedFrame| {
            orchestrator.on_frame(frame);
        });

        match self.source.start(&self.options.source, callback) {
            Ok(()) => {
                self.state = SessionState::Capturing;
                info!(source = %self.source.name(), "Capture started");
                self.emit(SessionEvent::CaptureStarted {
                    source: self.source.name().to_string(),
                });
                Ok(())
            }
            Err(e) => Err(self.block(e)),
        }
    }

    fn block(&mut self, err: PipelineError) -> PipelineError {
        if err.is_blocking() {
            warn!(error = %err, "Capture blocked");
        } else {
            error!(error = %err, "Capture failed to start");
        }
        self.state = SessionState::Blocked;
        self.emit(SessionEvent::CaptureBlocked(err.clone()));
        err
    }

    /// Try again after the user resolved a blocking condition
    pub fn retry_capture(&mut self, consent: Consent) -> PipelineResult<()> {
        info!(?consent, "Retrying capture");
        self.start(consent)
    }

    pub fn is_capturing(&self) -> bool {
        self.state == SessionState::Capturing
    }

    pub fn is_blocked(&self) -> bool {
        self.state == SessionState::Blocked
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn toggle_mode(&self) -> RenderMode {
        self.mode.toggle()
    }

    pub fn mode(&self) -> RenderMode {
        self.mode.current()
    }

    pub fn subscribe_fps(&self) -> watch::Receiver<u32> {
        self.orchestrator.subscribe_fps()
    }

    /// Last published FPS, closing an idle window first
    pub fn fps(&self) -> u32 {
        if self.is_capturing() {
            self.orchestrator.poll_fps();
        }
        self.orchestrator.fps()
    }

    pub fn engine_fps(&self) -> f32 {
        self.bridge.engine_fps()
    }

    pub fn surface_created(&self, width: u32, height: u32) {
        self.render.surface_created(width, height);
    }

    pub fn surface_resized(&self, width: u32, height: u32) {
        self.render.surface_resized(width, height);
    }

    pub fn surface_destroyed(&self) {
        self.render.surface_destroyed();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            source: self.source.stats(),
            pipeline: self.orchestrator.stats(),
            bridge: self.bridge.stats(),
            render_ticks: self.render.ticks(),
            render_draws: self.render.draws(),
        }
    }

    /// Stop everything in order
    ///
    /// No new frames are admitted, the source and its capture worker stop,
    /// the in-flight frame (at most one) finishes, the render loop stops and
    /// finally the engine is released. FPS drops to 0.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::ShutDown {
            return;
        }
        info!("Shutting down preview session");

        self.orchestrator.stop_admitting();
        self.source.stop();
        let idle = self
            .orchestrator
            .wait_idle(Duration::from_secs(timing::STOP_TIMEOUT_SECS));
        if !idle {
            warn!("Frame still in flight at shutdown");
        }
        self.render.stop();
        self.bridge.release_engine();
        self.orchestrator.reset_fps();

        self.state = SessionState::ShutDown;
        self.emit(SessionEvent::Stopped);
        info!(stats = ?self.stats(), "Preview session shut down");
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
