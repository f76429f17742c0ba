//! # Design
//!
//! - Constant-message errors for mount, enumeration and workspace operations.
//! - Carry the tool diagnostic and path context as fields, never in the message.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced while preparing, mounting or reading a disk image.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failures.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that triggered the traversal failure.
        operation: &'static str,
        /// Root of the traversal.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// External tool could not be started.
    #[error("fsops tool spawn failure")]
    Spawn {
        /// Operation that attempted the spawn.
        operation: &'static str,
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// External tool exited unsuccessfully.
    #[error("fsops tool failed")]
    ToolFailed {
        /// Operation the tool was performing.
        operation: &'static str,
        /// Program that failed.
        program: String,
        /// Exit code when the tool was not killed by a signal.
        status: Option<i32>,
        /// Captured stderr, or stdout when stderr was empty.
        diagnostic: String,
    },
    /// Mount point was missing or not empty before mounting.
    #[error("fsops mount point not ready")]
    MountPointNotReady {
        /// Mount point path.
        path: PathBuf,
        /// Static reason for the rejection.
        reason: &'static str,
    },
}

impl FsOpsError {
    /// Human-readable cause including the tool diagnostic when present.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} {}: {source}", path.display()),
            Self::Walkdir {
                operation,
                path,
                source,
            } => format!("{operation} {}: {source}", path.display()),
            Self::Spawn {
                operation,
                program,
                source,
            } => format!("{operation}: could not start {program}: {source}"),
            Self::ToolFailed {
                operation,
                program,
                status,
                diagnostic,
            } => {
                let status = status.map_or_else(|| "signal".to_string(), |code| code.to_string());
                format!("{operation}: {program} exited with {status}: {diagnostic}")
            }
            Self::MountPointNotReady { path, reason } => {
                format!("mount point {} {reason}", path.display())
            }
        }
    }
}
