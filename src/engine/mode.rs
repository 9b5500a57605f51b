// SPDX-License-Identifier: GPL-3.0-only

//! Visual mode state and the toggle

use super::bridge::ProcessingBridge;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::info;

/// Visual mode applied by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum RenderMode {
    /// Show the camera image unchanged
    #[default]
    Passthrough = 0,
    /// Show the edge-detected image
    ProcessedEdges = 1,
}

impl RenderMode {
    /// Integer code passed across the engine boundary
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(RenderMode::Passthrough),
            1 => Some(RenderMode::ProcessedEdges),
            _ => None,
        }
    }

    /// The other mode
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Passthrough => RenderMode::ProcessedEdges,
            RenderMode::ProcessedEdges => RenderMode::Passthrough,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Passthrough => "Camera",
            RenderMode::ProcessedEdges => "Edges",
        }
    }

    /// Status bar icon
    pub fn icon(self) -> &'static str {
        match self {
            RenderMode::Passthrough => "◉",
            RenderMode::ProcessedEdges => "▦",
        }
    }

    fn from_bits(bits: u8) -> Self {
        if bits & 1 == 1 {
            RenderMode::ProcessedEdges
        } else {
            RenderMode::Passthrough
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Lock-free single-word mode cell
///
/// Writers publish with release ordering and readers load with acquire
/// ordering, so a reader always sees one of the two modes in full.
#[derive(Debug, Default)]
pub struct ModeCell(AtomicU8);

impl ModeCell {
    pub fn new(mode: RenderMode) -> Self {
        Self(AtomicU8::new(mode as u8))
    }

    pub fn load(&self) -> RenderMode {
        RenderMode::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, mode: RenderMode) {
        self.0.store(mode as u8, Ordering::Release);
    }

    /// Flip the mode atomically and return the new one
    pub fn toggle(&self) -> RenderMode {
        RenderMode::from_bits(self.0.fetch_xor(1, Ordering::AcqRel) ^ 1)
    }
}

/// UI-side owner of the current mode
///
/// The mode it reports changes as soon as [`ModeController::toggle`]
/// returns, whether or not the engine has observed it yet.
pub struct ModeController {
    current: ModeCell,
    bridge: Arc<ProcessingBridge>,
}

impl ModeController {
    /// Starts in [`RenderMode::Passthrough`] and tells the engine so
    pub fn new(bridge: Arc<ProcessingBridge>) -> Self {
        bridge.set_mode(RenderMode::Passthrough);
        Self {
            current: ModeCell::new(RenderMode::Passthrough),
            bridge,
        }
    }

    pub fn current(&self) -> RenderMode {
        self.current.load()
    }

    /// Switch to the other mode and forward it to the engine
    pub fn toggle(&self) -> RenderMode {
        let mode = self.current.toggle();
        self.bridge.set_mode(mode);
        info!(mode = %mode, "Render mode toggled");
        mode
    }
}
