// SPDX-License-Identifier: GPL-3.0-only

//! Core-side entry point to the engine
//!
//! [`ProcessingBridge`] is the only way the pipeline reaches the engine. It
//! holds one exclusion lock across `initialize`, `process` and `draw`, so
//! processing (on the capture worker) and drawing (on the render thread)
//! never overlap even though they run on different threads. `set_mode` and
//! the FPS query go straight to the engine without taking that lock.

use super::mode::RenderMode;
use super::{Engine, STATUS_OK};
use crate::backends::camera::SensorRotation;
use crate::errors::{PipelineError, PipelineResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct SurfaceState {
    /// Engine resources exist for the current surface
    initialized: bool,
}

/// Bridge call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// `process` calls that returned OK
    pub processed: u64,
    /// `process` calls that returned a non-zero status
    pub failed: u64,
    pub draws: u64,
    pub initializations: u64,
}

pub struct ProcessingBridge {
    /// `None` once the engine has been released at shutdown
    engine: RwLock<Option<Arc<dyn Engine>>>,
    surface: Mutex<SurfaceState>,
    processed: AtomicU64,
    failed: AtomicU64,
    draws: AtomicU64,
    initializations: AtomicU64,
}

impl ProcessingBridge {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine: RwLock::new(Some(engine)),
            surface: Mutex::new(SurfaceState::default()),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            draws: AtomicU64::new(0),
            initializations: AtomicU64::new(0),
        }
    }

    fn engine(&self) -> Option<Arc<dyn Engine>> {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Initialize the engine for the current surface
    ///
    /// Does nothing if the engine is already initialized for this surface.
    /// Returns whether the engine's `initialize` actually ran.
    pub fn initialize(&self) -> bool {
        let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        if surface.initialized {
            debug!("Engine already initialized for this surface");
            return false;
        }
        let Some(engine) = self.engine() else {
            warn!("Engine released, not initializing");
            return false;
        };
        engine.initialize();
        surface.initialized = true;
        let n = self.initializations.fetch_add(1, Ordering::Relaxed) + 1;
        info!(initializations = n, "Engine initialized");
        true
    }

    /// Mark engine resources as lost with the surface
    ///
    /// `draw` fails with `SurfaceInvalidated` until `initialize` runs again.
    pub fn invalidate_surface(&self) {
        let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        if surface.initialized {
            info!("Render surface invalidated");
        }
        surface.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .initialized
    }

    /// Hand one frame to the engine and wait for it to finish
    pub fn process(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        rotation: SensorRotation,
        is_planar: bool,
    ) -> PipelineResult<()> {
        let surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        let engine = match self.engine() {
            Some(engine) if surface.initialized => engine,
            _ => return Err(PipelineError::EngineNotInitialized),
        };

        let status = engine.process(pixels, width, height, rotation.degrees(), is_planar);
        drop(surface);

        if status == STATUS_OK {
            self.processed.fetch_add(1, Ordering::Relaxed);
            Ok(())
        } else {
            let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(status, width, height, failed, "Engine process failed");
            Err(PipelineError::ProcessingFailure { status })
        }
    }

    /// Draw the engine's latest result
    pub fn draw(&self) -> PipelineResult<()> {
        let surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        let engine = match self.engine() {
            Some(engine) if surface.initialized => engine,
            _ => return Err(PipelineError::SurfaceInvalidated),
        };
        engine.draw();
        drop(surface);
        self.draws.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Forward a mode change without waiting for `process` or `draw`
    pub fn set_mode(&self, mode: RenderMode) {
        if let Some(engine) = self.engine() {
            engine.set_mode(mode.code());
        }
    }

    /// Frame rate measured by the engine itself
    pub fn engine_fps(&self) -> f32 {
        self.engine().map(|e| e.fps()).unwrap_or(0.0)
    }

    /// Drop the bridge's reference to the engine
    ///
    /// Waits for any `process` or `draw` in progress. Afterwards every
    /// engine call fails or does nothing. Returns false if already released.
    pub fn release_engine(&self) -> bool {
        let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        surface.initialized = false;
        let released = self
            .engine
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if released {
            info!(stats = ?self.stats(), "Engine released");
        }
        released
    }

    pub fn is_released(&self) -> bool {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
            initializations: self.initializations.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ProcessingBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingBridge")
            .field("initialized", &self.is_initialized())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[derive(Default)]
    struct CountingEngine {
        inits: AtomicU64,
        draws: AtomicU64,
        status: AtomicI32,
        mode: AtomicI32,
    }

    impl Engine for CountingEngine {
        fn initialize(&self) {
            self.inits.fetch_add(1, Ordering::SeqCst);
        }

        fn process(&self, _: &[u8], _: u32, _: u32, _: u32, _: bool) -> i32 {
            self.status.load(Ordering::SeqCst)
        }

        fn draw(&self) {
            self.draws.fetch_add(1, Ordering::SeqCst);
        }

        fn set_mode(&self, mode: i32) {
            self.mode.store(mode, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let engine = Arc::new(CountingEngine::default());
        let bridge = ProcessingBridge::new(engine.clone());

        assert!(bridge.initialize());
        assert!(!bridge.initialize());
        assert_eq!(engine.inits.load(Ordering::SeqCst), 1);

        bridge.invalidate_surface();
        assert!(bridge.initialize());
        assert_eq!(engine.inits.load(Ordering::SeqCst), 2);
        assert_eq!(bridge.stats().initializations, 2);
    }

    #[test]
    fn test_draw_requires_live_surface() {
        let engine = Arc::new(CountingEngine::default());
        let bridge = ProcessingBridge::new(engine.clone());

        assert_eq!(bridge.draw(), Err(PipelineError::SurfaceInvalidated));
        bridge.initialize();
        assert!(bridge.draw().is_ok());
        bridge.invalidate_surface();
        assert_eq!(bridge.draw(), Err(PipelineError::SurfaceInvalidated));
        assert_eq!(engine.draws.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_process_status_mapping() {
        let engine = Arc::new(CountingEngine::default());
        let bridge = ProcessingBridge::new(engine.clone());

        assert_eq!(
            bridge.process(&[0; 6], 2, 2, SensorRotation::None, true),
            Err(PipelineError::EngineNotInitialized)
        );

        bridge.initialize();
        assert!(bridge.process(&[0; 6], 2, 2, SensorRotation::None, true).is_ok());

        engine.status.store(-2, Ordering::SeqCst);
        assert_eq!(
            bridge.process(&[0; 6], 2, 2, SensorRotation::None, true),
            Err(PipelineError::ProcessingFailure { status: -2 })
        );

        let stats = bridge.stats();
        assert_eq!((stats.processed, stats.failed), (1, 1));
    }

    #[test]
    fn test_set_mode_forwards_code() {
        let engine = Arc::new(CountingEngine::default());
        let bridge = ProcessingBridge::new(engine.clone());
        bridge.set_mode(RenderMode::ProcessedEdges);
        assert_eq!(engine.mode.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.engine_fps(), 0.0);
    }

    #[test]
    fn test_release_engine_drops_it() {
        let engine = Arc::new(CountingEngine::default());
        let bridge = ProcessingBridge::new(engine.clone());
        bridge.initialize();
        assert_eq!(Arc::strong_count(&engine), 2);

        assert!(bridge.release_engine());
        assert!(!bridge.release_engine());
        assert!(bridge.is_released());
        assert_eq!(Arc::strong_count(&engine), 1);

        assert_eq!(bridge.draw(), Err(PipelineError::SurfaceInvalidated));
        assert_eq!(
            bridge.process(&[0; 6], 2, 2, SensorRotation::None, true),
            Err(PipelineError::EngineNotInitialized)
        );
        assert!(!bridge.initialize());
    }
}
