// SPDX-License-Identifier: GPL-3.0-only

//! edgecam - live camera preview with a switchable edge-detection view
//!
//! Frames flow from a capture source through format conversion into a
//! processing engine, while an independent render loop keeps drawing the
//! engine's latest output.
//!
//! # Architecture
//!
//! - [`backends`]: Frame sources (PipeWire camera, test pattern) and the
//!   capture plumbing shared by them
//! - [`engine`]: Processing engine trait, the bridge that guards it and the
//!   render mode switch
//! - [`pipelines`]: The preview pipeline (orchestrator, FPS meter, session)
//! - [`render`]: Continuous render loop bound to a surface lifecycle
//! - [`terminal`]: Terminal viewer
//! - [`config`]: User configuration handling

pub mod backends;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod pipelines;
pub mod render;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use engine::{ModeController, ProcessingBridge, RenderMode};
pub use errors::{AppError, PipelineError};
pub use pipelines::preview::{Consent, PreviewSession};
