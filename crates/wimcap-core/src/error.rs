//! Error types for capture domain validation.

use std::path::PathBuf;

use thiserror::Error;

/// Validation failures raised while constructing domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Path does not name a supported disk image.
    #[error("invalid disk image path")]
    InvalidImagePath {
        /// Offending path.
        path: PathBuf,
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
    /// Compression code is outside the engine's enumeration.
    #[error("unknown compression mode")]
    UnknownCompression {
        /// Raw value supplied by the caller.
        value: u32,
    },
}

/// Convenience alias for domain validation results.
pub type CoreResult<T> = Result<T, CoreError>;
