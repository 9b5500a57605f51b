// SPDX-License-Identifier: GPL-3.0-only

//! Live preview pipeline
//!
//! ```text
//! capture worker ──▶ Orchestrator::on_frame
//!                      │ busy guard (one in flight, others released)
//!                      │ FormatConverter (I420 → Y,V,U)
//!                      │ ProcessingBridge::process ─┐
//!                      ▼                            │ exclusion lock
//!                    FpsMeter → watch channel       │
//! render thread ──▶ ProcessingBridge::draw ─────────┘
//! UI ──▶ ModeController::toggle → ProcessingBridge::set_mode
//! ```

pub mod busy_guard;
pub mod fps;
pub mod orchestrator;
pub mod session;

pub use busy_guard::{BusyFlag, BusyGuard};
pub use fps::FpsMeter;
pub use orchestrator::{FrameOutcome, Orchestrator, OrchestratorStats};
pub use session::{Consent, PreviewSession, SessionEvent, SessionOptions, SessionStats};
