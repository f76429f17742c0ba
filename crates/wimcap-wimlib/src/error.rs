//! Error types for archive engine operations.

use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Step of the create, add, write sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Allocating the in-memory archive.
    Create,
    /// Capturing sources into an image.
    Add,
    /// Serialising the archive to disk.
    Write,
}

impl EnginePhase {
    /// Stable identifier for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Add => "add",
            Self::Write => "write",
        }
    }
}

impl Display for EnginePhase {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failures raised by an archive engine.
#[derive(Debug, Error)]
pub enum WimlibError {
    /// Native call returned a non-zero status.
    #[error("archive engine call failed")]
    Engine {
        /// Phase that failed.
        phase: EnginePhase,
        /// Raw engine status code.
        status: i32,
        /// Engine description of the status.
        message: String,
    },
    /// Path or name could not be encoded for the engine.
    #[error("archive engine argument invalid")]
    InvalidArgument {
        /// Phase that rejected the argument.
        phase: EnginePhase,
        /// Offending value.
        value: PathBuf,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// Filesystem failure inside a non-native engine.
    #[error("archive engine io failure")]
    Io {
        /// Phase that failed.
        phase: EnginePhase,
        /// Operation identifier.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Source traversal failure inside a non-native engine.
    #[error("archive engine walk failure")]
    Walk {
        /// Root of the traversal.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Manifest serialisation failure inside the stub engine.
    #[error("archive manifest encode failure")]
    Manifest {
        /// Destination path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Failure injected by a test engine.
    #[error("archive engine scripted failure")]
    Scripted {
        /// Phase that failed.
        phase: EnginePhase,
        /// Scripted description.
        message: String,
    },
}

impl WimlibError {
    /// Phase the failure belongs to.
    #[must_use]
    pub const fn phase(&self) -> EnginePhase {
        match self {
            Self::Engine { phase, .. }
            | Self::InvalidArgument { phase, .. }
            | Self::Io { phase, .. }
            | Self::Scripted { phase, .. } => *phase,
            Self::Walk { .. } => EnginePhase::Add,
            Self::Manifest { .. } => EnginePhase::Write,
        }
    }

    /// Raw engine status when the failure came from the native library.
    #[must_use]
    pub const fn status(&self) -> Option<i32> {
        match self {
            Self::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable cause.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Engine {
                status, message, ..
            } => format!("wimlib status {status}: {message}"),
            Self::InvalidArgument { value, reason, .. } => {
                format!("{reason}: {}", value.display())
            }
            Self::Io {
                operation,
                path,
                source,
                ..
            } => format!("{operation} {}: {source}", path.display()),
            Self::Walk { path, source } => format!("walk {}: {source}", path.display()),
            Self::Manifest { path, source } => format!("manifest {}: {source}", path.display()),
            Self::Scripted { message, .. } => message.clone(),
        }
    }
}

/// Convenience alias for engine results.
pub type WimlibResult<T> = Result<T, WimlibError>;
