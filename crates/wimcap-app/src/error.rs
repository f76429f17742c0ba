//! # Design
//!
//! - One `PipelineError` variant per failed capture run; messages are
//!   constant and context lives in fields.
//! - `PipelineFailure` pairs the error with the partial artifact once the
//!   workspace exists, so the host can inspect what was left behind.
//! - `AppError` covers the binary's bootstrap around the pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use wimcap_fsops::FsOpsError;
use wimcap_wimlib::{EnginePhase, WimlibError};

use crate::artifact::Artifact;
use crate::pipeline::PipelineState;

/// Failure of a single capture run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upstream builder is not the Hyper-V family.
    #[error("unsupported source builder")]
    UnsupportedSourceKind {
        /// Builder identifier supplied by the host.
        builder_id: String,
    },
    /// Upstream artifact carried no `.vhd`/`.vhdx` file.
    #[error("no disk image file found")]
    NoImageFileFound {
        /// Builder identifier supplied by the host.
        builder_id: String,
        /// Number of files inspected.
        files: usize,
    },
    /// Workspace or mount-point directory could not be created.
    #[error("workspace creation failed")]
    WorkspaceCreationFailed {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying filesystem error.
        source: FsOpsError,
    },
    /// Mount tool failed.
    #[error("disk image mount failed")]
    MountFailed {
        /// Image that was being mounted.
        image: PathBuf,
        /// Tool diagnostic.
        detail: String,
        /// Underlying mount error.
        source: FsOpsError,
    },
    /// Mounted root could not be listed.
    #[error("mounted tree enumeration failed")]
    EnumerationFailed {
        /// Mount point being listed.
        mount_point: PathBuf,
        /// Underlying traversal error.
        source: FsOpsError,
    },
    /// Archive engine could not allocate an archive.
    #[error("archive creation failed")]
    ArchiveCreateFailed {
        /// Engine status code when reported.
        status: Option<i32>,
        /// Engine diagnostic.
        detail: String,
        /// Underlying engine error.
        source: WimlibError,
    },
    /// Archive engine failed while adding sources or writing the file.
    #[error("archive write failed")]
    ArchiveWriteFailed {
        /// Failing phase; `None` when the capture worker itself died.
        phase: Option<EnginePhase>,
        /// Engine status code when reported.
        status: Option<i32>,
        /// Engine diagnostic.
        detail: String,
        /// Underlying engine error when the engine reported one.
        source: Option<WimlibError>,
    },
    /// Unmount tool failed.
    #[error("disk image unmount failed")]
    UnmountFailed {
        /// Mount point being released.
        mount_point: PathBuf,
        /// Tool diagnostic.
        detail: String,
        /// Underlying mount error.
        source: FsOpsError,
    },
    /// Cancellation was observed before the run completed.
    #[error("capture cancelled")]
    Cancelled {
        /// State the pipeline was in when cancellation was observed.
        state: PipelineState,
    },
}

impl PipelineError {
    /// Human-readable cause for progress output.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::UnsupportedSourceKind { builder_id } => {
                format!("unsupported builder '{builder_id}'; only Hyper-V images can be captured")
            }
            Self::NoImageFileFound { builder_id, files } => {
                format!("no .vhd/.vhdx among {files} file(s) from '{builder_id}'")
            }
            Self::WorkspaceCreationFailed { source, .. } | Self::EnumerationFailed { source, .. } => {
                source.detail()
            }
            Self::MountFailed { detail, .. }
            | Self::ArchiveCreateFailed { detail, .. }
            | Self::ArchiveWriteFailed { detail, .. }
            | Self::UnmountFailed { detail, .. } => detail.clone(),
            Self::Cancelled { state } => format!("cancelled while {}", state.as_str()),
        }
    }

    pub(crate) fn from_engine(source: WimlibError) -> Self {
        let status = source.status();
        let detail = source.detail();
        match source.phase() {
            EnginePhase::Create => Self::ArchiveCreateFailed {
                status,
                detail,
                source,
            },
            phase => Self::ArchiveWriteFailed {
                phase: Some(phase),
                status,
                detail,
                source: Some(source),
            },
        }
    }
}

/// Failed run plus whatever artifact had been laid out.
#[derive(Debug, Error)]
#[error("capture pipeline failed")]
pub struct PipelineFailure {
    /// Root cause.
    #[source]
    pub error: PipelineError,
    /// Partial artifact; present once the workspace exists.
    pub artifact: Option<Artifact>,
}

impl PipelineFailure {
    pub(crate) const fn new(error: PipelineError, artifact: Option<Artifact>) -> Self {
        Self { error, artifact }
    }
}

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: wimcap_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: wimcap_telemetry::TelemetryError,
    },
    /// Capture run failed.
    #[error("capture failed")]
    Capture {
        /// Source pipeline failure.
        source: PipelineFailure,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
    /// Encoding or decoding the artifact manifest failed.
    #[error("artifact manifest serialisation failed")]
    Manifest {
        /// Destination path.
        path: PathBuf,
        /// Source JSON error.
        source: serde_json::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: wimcap_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: wimcap_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: Some(path.into()),
            source,
        }
    }
}
