//! Capture pipeline: validate, mount, enumerate, capture, unmount.
//!
//! # Design
//!
//! - One controlling task drives a run; only the engine work leaves it, on
//!   the blocking pool.
//! - Cancellation stops waiting. It never interrupts the engine, so a
//!   capture abandoned mid-flight finishes in the background and its result
//!   is dropped.
//! - Unmount runs exactly once after a successful mount, whatever happened
//!   in between. The first error of a run is the one returned.

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;
use wimcap_config::CaptureProfile;
use wimcap_core::{CaptureRequest, DiskImageRef, UpstreamArtifact};
use wimcap_fsops::{FsOpsError, MountPoint, MountService, MountSession, SourceEnumerator, prepare_workspace};
use wimcap_telemetry::capture_span;
use wimcap_wimlib::{ArchiveWriter, spawn_capture};

use crate::artifact::Artifact;
use crate::error::{PipelineError, PipelineFailure};
use crate::progress::{ProgressSink, TracingSink};

/// Position of a run in the capture state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Not started.
    Idle,
    /// Checking the upstream artifact.
    Validating,
    /// Laying out the workspace and mounting the image.
    Mounting,
    /// Listing the mounted root.
    Enumerating,
    /// Engine work in flight.
    Capturing,
    /// Releasing the mounted image.
    Unmounting,
    /// Archive written and image released.
    Done,
    /// Run ended with an error.
    Failed,
    /// Run ended because cancellation was observed.
    Cancelled,
}

impl PipelineState {
    /// Lower-case label used in logs and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Mounting => "mounting",
            Self::Enumerating => "enumerating",
            Self::Capturing => "capturing",
            Self::Unmounting => "unmounting",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one disk image through mount, capture and unmount.
pub struct CapturePipeline {
    mounts: Arc<dyn MountService>,
    writer: ArchiveWriter,
    enumerator: SourceEnumerator,
    progress: Arc<dyn ProgressSink>,
}

impl CapturePipeline {
    /// Pipeline reporting progress through `tracing` only.
    #[must_use]
    pub fn new(mounts: Arc<dyn MountService>, writer: ArchiveWriter) -> Self {
        Self {
            mounts,
            writer,
            enumerator: SourceEnumerator,
            progress: Arc::new(TracingSink),
        }
    }

    /// Replace the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Capture the disk image of `upstream` into `<work_dir>/<name>.wim`.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] holding exactly one [`PipelineError`];
    /// the partial [`Artifact`] is attached once `work_dir` exists.
    pub async fn run(
        &self,
        upstream: &UpstreamArtifact,
        work_dir: &Path,
        profile: &CaptureProfile,
        cancel: &CancellationToken,
    ) -> Result<Artifact, PipelineFailure> {
        let run_id = Uuid::new_v4().simple().to_string();
        let image_label = upstream
            .disk_image()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        let span = capture_span(&run_id, &image_label);

        let result = self
            .execute(upstream, work_dir, profile, cancel)
            .instrument(span.clone())
            .await;

        span.in_scope(|| self.finish(&result));
        result
    }

    fn finish(&self, result: &Result<Artifact, PipelineFailure>) {
        match result {
            Ok(artifact) => {
                info!(archive = %artifact.archive_path.display(), "capture complete");
                self.enter(PipelineState::Done);
            }
            Err(failure) if matches!(failure.error, PipelineError::Cancelled { .. }) => {
                warn!(detail = %failure.error.detail(), "capture cancelled");
                self.enter(PipelineState::Cancelled);
            }
            Err(failure) => {
                warn!(error = %failure.error, detail = %failure.error.detail(), "capture failed");
                self.progress
                    .message(&format!("Capture failed: {}", failure.error.detail()));
                self.enter(PipelineState::Failed);
            }
        }
    }

    async fn execute(
        &self,
        upstream: &UpstreamArtifact,
        work_dir: &Path,
        profile: &CaptureProfile,
        cancel: &CancellationToken,
    ) -> Result<Artifact, PipelineFailure> {
        self.enter(PipelineState::Validating);
        let image = validate_upstream(upstream).map_err(|error| PipelineFailure::new(error, None))?;
        for warning in &profile.warnings {
            self.progress.message(warning);
        }
        if cancel.is_cancelled() {
            return Err(PipelineFailure::new(
                PipelineError::Cancelled {
                    state: PipelineState::Validating,
                },
                None,
            ));
        }

        self.enter(PipelineState::Mounting);
        let work_dir =
            absolute_workspace(work_dir).map_err(|error| PipelineFailure::new(error, None))?;
        let work_dir = work_dir.as_path();
        prepare_workspace(work_dir).map_err(|source| {
            PipelineFailure::new(
                PipelineError::WorkspaceCreationFailed {
                    path: work_dir.to_path_buf(),
                    source,
                },
                None,
            )
        })?;
        let artifact = Artifact::new(
            profile.name.clone(),
            work_dir,
            profile.compression,
            profile.description.clone(),
        );
        let mount_point = match MountPoint::create(work_dir) {
            Ok(mount_point) => mount_point,
            Err(source) => {
                return Err(PipelineFailure::new(
                    PipelineError::WorkspaceCreationFailed {
                        path: work_dir.to_path_buf(),
                        source,
                    },
                    Some(artifact),
                ));
            }
        };

        info!(
            image = %image,
            mount_point = %mount_point.path().display(),
            "mounting disk image"
        );
        self.progress.message(&format!(
            "Mounting {image} at {}",
            mount_point.path().display()
        ));
        let session = match self.mounts.mount(&image, mount_point.path()).await {
            Ok(session) => session,
            Err(source) => {
                // Nothing is attached, so only the empty directory goes.
                self.release_mount_point(mount_point, false);
                return Err(PipelineFailure::new(
                    PipelineError::MountFailed {
                        image: image.path().to_path_buf(),
                        detail: source.detail(),
                        source,
                    },
                    Some(artifact),
                ));
            }
        };
        self.progress.message("Image mounted");

        let captured = self
            .capture_mounted(&session, &artifact, profile, cancel)
            .await;

        self.enter(PipelineState::Unmounting);
        let released_path = session.mount_point().to_path_buf();
        self.progress
            .message(&format!("Unmounting {}", released_path.display()));
        let unmounted = self.mounts.unmount(session, true).await;
        self.release_mount_point(mount_point, unmounted.is_ok());

        match (captured, unmounted) {
            (Ok(()), Ok(())) => {
                self.progress.message("Image unmounted");
                Ok(artifact)
            }
            (Ok(()), Err(source)) => Err(PipelineFailure::new(
                PipelineError::UnmountFailed {
                    mount_point: released_path,
                    detail: source.detail(),
                    source,
                },
                Some(artifact),
            )),
            (Err(error), Ok(())) => {
                self.progress.message("Image unmounted");
                Err(PipelineFailure::new(error, Some(artifact)))
            }
            (Err(error), Err(secondary)) => {
                warn!(
                    mount_point = %released_path.display(),
                    detail = %secondary.detail(),
                    "unmount after failed capture also failed"
                );
                self.progress.message(&format!(
                    "Unmount after failure also failed: {}",
                    secondary.detail()
                ));
                Err(PipelineFailure::new(error, Some(artifact)))
            }
        }
    }

    async fn capture_mounted(
        &self,
        session: &MountSession,
        artifact: &Artifact,
        profile: &CaptureProfile,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                state: PipelineState::Mounting,
            });
        }

        self.enter(PipelineState::Enumerating);
        let mount_point = session.mount_point();
        let sources = self.enumerator.enumerate(mount_point).map_err(|source| {
            PipelineError::EnumerationFailed {
                mount_point: mount_point.to_path_buf(),
                source,
            }
        })?;
        info!(sources = sources.len(), "mounted tree enumerated");
        self.progress
            .message(&format!("Found {} source(s) to capture", sources.len()));
        for source in &sources {
            self.progress.message(&format!(
                "Adding {} as {}",
                source.local_path.display(),
                source.archive_path
            ));
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                state: PipelineState::Enumerating,
            });
        }

        self.enter(PipelineState::Capturing);
        let request = CaptureRequest::new(
            profile.name.clone(),
            profile.compression,
            sources,
            &artifact.archive_path,
        );
        info!(
            engine = self.writer.engine_name(),
            compression = %profile.compression,
            output = %artifact.archive_path.display(),
            "capture started"
        );
        self.progress.message(&format!(
            "Capturing image '{}' with {} compression",
            profile.name,
            profile.compression.codec_name()
        ));

        let worker = spawn_capture(self.writer.clone(), request);
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!("capture abandoned; engine work continues in the background");
                Err(PipelineError::Cancelled { state: PipelineState::Capturing })
            }
            joined = worker => match joined {
                Ok(Ok(())) => {
                    self.progress.message(&format!(
                        "Archive written to {}",
                        artifact.archive_path.display()
                    ));
                    Ok(())
                }
                Ok(Err(err)) => Err(PipelineError::from_engine(err)),
                Err(join_err) => Err(PipelineError::ArchiveWriteFailed {
                    phase: None,
                    status: None,
                    detail: format!("capture worker failed: {join_err}"),
                    source: None,
                }),
            }
        }
    }

    fn release_mount_point(&self, mount_point: MountPoint, detached: bool) {
        if let Err(err) = mount_point.release(detached) {
            self.progress
                .message(&format!("Mount point not removed: {}", err.detail()));
        }
    }

    fn enter(&self, state: PipelineState) {
        debug!(state = state.as_str(), "pipeline state");
        self.progress.state(state);
    }
}

/// Resolve `work_dir` against the current directory so every path handed to
/// the mount tool and the engine is absolute.
fn absolute_workspace(work_dir: &Path) -> Result<PathBuf, PipelineError> {
    std::path::absolute(work_dir).map_err(|source| PipelineError::WorkspaceCreationFailed {
        path: work_dir.to_path_buf(),
        source: FsOpsError::Io {
            operation: "workspace.absolutize",
            path: work_dir.to_path_buf(),
            source,
        },
    })
}

fn validate_upstream(upstream: &UpstreamArtifact) -> Result<DiskImageRef, PipelineError> {
    let kind = upstream.builder_kind();
    if !kind.is_supported() {
        return Err(PipelineError::UnsupportedSourceKind {
            builder_id: kind.builder_id().to_string(),
        });
    }
    let no_image = || PipelineError::NoImageFileFound {
        builder_id: upstream.builder_id.clone(),
        files: upstream.files.len(),
    };
    let path = upstream.disk_image().ok_or_else(no_image)?;
    DiskImageRef::new(path).map_err(|_| no_image())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_display_their_labels() {
        assert_eq!(PipelineState::Enumerating.to_string(), "enumerating");
        assert_eq!(PipelineState::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn validation_picks_first_disk_image() -> anyhow::Result<()> {
        let upstream = UpstreamArtifact::new(
            "MSOpenTech.hyperv",
            vec![
                PathBuf::from("/out/notes.txt"),
                PathBuf::from("/out/disk.VHDX"),
                PathBuf::from("/out/second.vhd"),
            ],
        );
        let image = validate_upstream(&upstream)?;
        assert_eq!(image.path(), Path::new("/out/disk.VHDX"));
        Ok(())
    }

    #[test]
    fn validation_rejects_qemu_and_unknown_builders() {
        for builder in ["transcend.qemu", "some.other"] {
            let upstream = UpstreamArtifact::new(builder, vec![PathBuf::from("/out/disk.vhd")]);
            assert!(matches!(
                validate_upstream(&upstream),
                Err(PipelineError::UnsupportedSourceKind { builder_id }) if builder_id == builder
            ));
        }
    }

    #[test]
    fn validation_requires_a_disk_image() {
        let upstream =
            UpstreamArtifact::new("MSOpenTech.hyperv", vec![PathBuf::from("/out/disk.qcow2")]);
        assert!(matches!(
            validate_upstream(&upstream),
            Err(PipelineError::NoImageFileFound { files: 1, .. })
        ));
    }
}
