// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the preview pipeline and the application around it

use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Errors raised by the capture → convert → process → draw pipeline
///
/// Only [`PipelineError::DeviceUnavailable`] and [`PipelineError::ConsentDenied`]
/// are blocking: they stop capture until the user acts. Everything else is
/// scoped to a single frame or a single render tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The capture device could not be opened (busy, missing, access revoked)
    DeviceUnavailable(String),
    /// The user refused camera access
    ConsentDenied,
    /// Plane sizes do not add up to the canonical layout for the frame size
    MalformedPlanes {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    /// The engine returned a non-zero status from `process`
    ProcessingFailure { status: i32 },
    /// The render surface was destroyed; the engine needs `initialize` again
    SurfaceInvalidated,
    /// `process` was attempted before the engine was initialized
    EngineNotInitialized,
    /// The session was already shut down
    SessionClosed,
}

impl PipelineError {
    /// Whether this error blocks capture until the user intervenes
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            PipelineError::DeviceUnavailable(_) | PipelineError::ConsentDenied
        )
    }
}

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Pipeline errors
    Pipeline(PipelineError),
    /// Configuration errors
    Config(String),
    /// Terminal / filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::DeviceUnavailable(msg) => write!(f, "Camera unavailable: {}", msg),
            PipelineError::ConsentDenied => write!(f, "Camera access was not granted"),
            PipelineError::MalformedPlanes {
                width,
                height,
                expected,
                actual,
            } => write!(
                f,
                "Malformed planes for {}x{}: expected {} bytes, got {}",
                width, height, expected, actual
            ),
            PipelineError::ProcessingFailure { status } => {
                write!(f, "Processing failed with status {}", status)
            }
            PipelineError::SurfaceInvalidated => write!(f, "Render surface invalidated"),
            PipelineError::EngineNotInitialized => write!(f, "Engine not initialized"),
            PipelineError::SessionClosed => write!(f, "Preview session already shut down"),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for AppError {}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_classification() {
        assert!(PipelineError::DeviceUnavailable("busy".into()).is_blocking());
        assert!(PipelineError::ConsentDenied.is_blocking());
        assert!(!PipelineError::SurfaceInvalidated.is_blocking());
        assert!(!PipelineError::SessionClosed.is_blocking());
        assert!(!PipelineError::ProcessingFailure { status: -1 }.is_blocking());
        assert!(
            !PipelineError::MalformedPlanes {
                width: 2,
                height: 2,
                expected: 6,
                actual: 5
            }
            .is_blocking()
        );
    }

    #[test]
    fn test_display_includes_details() {
        let err = PipelineError::MalformedPlanes {
            width: 4,
            height: 2,
            expected: 12,
            actual: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("4x2"));
        assert!(msg.contains("12"));
        assert!(msg.contains("10"));

        let app: AppError = PipelineError::ProcessingFailure { status: -2 }.into();
        assert!(app.to_string().contains("-2"));
    }
}
