// SPDX-License-Identifier: GPL-3.0-only

//! Continuous render loop
//!
//! [`RenderSurface`] owns the render thread. It ticks at a fixed interval no
//! matter when frames arrive and calls `draw` on every tick while a surface
//! exists. Surface lifecycle events from the UI are queued and applied on
//! the render thread at the start of the next tick, so `initialize` and
//! `draw` only ever run there.

use crate::backends::camera::frame_loop::{LoopAction, LoopController};
use crate::engine::ProcessingBridge;
use crate::errors::PipelineError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Surface lifecycle reported by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Created { width: u32, height: u32 },
    Resized { width: u32, height: u32 },
    Destroyed,
}

#[derive(Debug, Default)]
struct RenderCounters {
    ticks: AtomicU64,
    draws: AtomicU64,
}

/// Render thread state
struct RenderLoop {
    bridge: Arc<ProcessingBridge>,
    events: Receiver<SurfaceEvent>,
    counters: Arc<RenderCounters>,
    size: Arc<Mutex<Option<(u32, u32)>>>,
    live: bool,
}

impl RenderLoop {
    fn apply(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Created { width, height } => {
                info!(width, height, "Render surface created");
                *self.size.lock().unwrap_or_else(PoisonError::into_inner) = Some((width, height));
                self.bridge.initialize();
                self.live = true;
            }
            SurfaceEvent::Resized { width, height } => {
                // Viewport is the engine's business
                debug!(width, height, "Render surface resized");
                *self.size.lock().unwrap_or_else(PoisonError::into_inner) = Some((width, height));
            }
            SurfaceEvent::Destroyed => {
                info!("Render surface destroyed");
                *self.size.lock().unwrap_or_else(PoisonError::into_inner) = None;
                self.bridge.invalidate_surface();
                self.live = false;
            }
        }
    }

    fn tick(&mut self) -> LoopAction {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }

        self.counters.ticks.fetch_add(1, Ordering::Relaxed);
        if !self.live {
            return LoopAction::Continue;
        }

        match self.bridge.draw() {
            Ok(()) => {
                self.counters.draws.fetch_add(1, Ordering::Relaxed);
            }
            Err(PipelineError::SurfaceInvalidated) => {
                // Invalidated behind our back; re-create resources on this thread
                warn!("Surface invalid at draw, re-initializing");
                self.bridge.initialize();
            }
            Err(e) => warn!(error = %e, "Draw failed"),
        }
        LoopAction::Continue
    }
}

/// Handle to the running render loop
pub struct RenderSurface {
    events: Sender<SurfaceEvent>,
    counters: Arc<RenderCounters>,
    size: Arc<Mutex<Option<(u32, u32)>>>,
    interval: Duration,
    controller: LoopController,
}

impl RenderSurface {
    /// Spawn the render thread ticking every `interval`
    ///
    /// Nothing is drawn until [`RenderSurface::surface_created`].
    pub fn start(bridge: Arc<ProcessingBridge>, interval: Duration) -> std::io::Result<Self> {
        let (events, receiver) = mpsc::channel();
        let counters = Arc::new(RenderCounters::default());
        let size = Arc::new(Mutex::new(None));

        let mut render_loop = RenderLoop {
            bridge,
            events: receiver,
            counters: Arc::clone(&counters),
            size: Arc::clone(&size),
            live: false,
        };
        let controller = LoopController::start_paced("render", interval, move || render_loop.tick())?;
        info!(interval_us = interval.as_micros() as u64, "Render loop started");

        Ok(Self {
            events,
            counters,
            size,
            interval,
            controller,
        })
    }

    fn send(&self, event: SurfaceEvent) {
        if self.events.send(event).is_err() {
            debug!(?event, "Render loop gone, surface event ignored");
        }
    }

    pub fn surface_created(&self, width: u32, height: u32) {
        self.send(SurfaceEvent::Created { width, height });
    }

    pub fn surface_resized(&self, width: u32, height: u32) {
        self.send(SurfaceEvent::Resized { width, height });
    }

    pub fn surface_destroyed(&self) {
        self.send(SurfaceEvent::Destroyed);
    }

    /// Last size reported for a live surface
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ticks(&self) -> u64 {
        self.counters.ticks.load(Ordering::Relaxed)
    }

    pub fn draws(&self) -> u64 {
        self.counters.draws.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Stop ticking and join the render thread
    pub fn stop(&mut self) {
        self.controller.stop();
        info!(ticks = self.ticks(), draws = self.draws(), "Render loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, Presenter, SoftwareEngine};
    use std::thread;

    fn bridge() -> Arc<ProcessingBridge> {
        let engine: Arc<dyn Engine> = Arc::new(SoftwareEngine::new(Arc::new(Presenter::new())));
        Arc::new(ProcessingBridge::new(engine))
    }

    #[test]
    fn test_no_draw_without_surface() {
        let bridge = bridge();
        let mut surface = RenderSurface::start(Arc::clone(&bridge), Duration::from_millis(5)).unwrap();
        thread::sleep(Duration::from_millis(50));
        surface.stop();

        assert!(surface.ticks() > 0);
        assert_eq!(surface.draws(), 0);
        assert!(!bridge.is_initialized());
    }

    #[test]
    fn test_draws_every_tick_without_frames() {
        let bridge = bridge();
        let mut surface = RenderSurface::start(Arc::clone(&bridge), Duration::from_millis(5)).unwrap();
        surface.surface_created(80, 24);
        thread::sleep(Duration::from_millis(100));
        surface.stop();

        assert!(bridge.is_initialized());
        assert!(surface.draws() >= 5, "draws {}", surface.draws());
        // Only the first tick can precede the created event
        assert!(surface.ticks() - surface.draws() <= 1);
        assert_eq!(surface.surface_size(), Some((80, 24)));
    }

    #[test]
    fn test_recreated_surface_reinitializes() {
        let bridge = bridge();
        let mut surface = RenderSurface::start(Arc::clone(&bridge), Duration::from_millis(5)).unwrap();
        surface.surface_created(10, 10);
        thread::sleep(Duration::from_millis(30));
        surface.surface_destroyed();
        thread::sleep(Duration::from_millis(30));
        assert!(!bridge.is_initialized());
        let draws_while_gone = surface.draws();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(surface.draws(), draws_while_gone);

        surface.surface_resized(20, 20);
        surface.surface_created(20, 20);
        thread::sleep(Duration::from_millis(30));
        surface.stop();

        assert_eq!(bridge.stats().initializations, 2);
        assert!(surface.draws() > draws_while_gone);
        assert_eq!(surface.surface_size(), Some((20, 20)));
    }
}
