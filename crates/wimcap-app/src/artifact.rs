//! Result of a capture run as handed back to the host.

use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use wimcap_core::{CompressionMode, archive_file_name};

use crate::error::{AppError, AppResult};

/// Identifier reported to the host for artifacts produced here.
pub const ARTIFACT_BUILDER_ID: &str = "wimcap.post-processor.wim";

/// Archive produced by a capture run, or the workspace left by a failed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Archive base name.
    pub name: String,
    /// Workspace directory holding the archive.
    pub output_directory: PathBuf,
    /// Compression the archive was written with.
    pub compression: CompressionMode,
    /// `<output_directory>/<name>.wim`.
    pub archive_path: PathBuf,
    /// Free-form description carried from configuration.
    pub description: String,
    /// Time the workspace was laid out.
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Describe the archive `name` inside `output_directory`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        output_directory: impl Into<PathBuf>,
        compression: CompressionMode,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let output_directory = output_directory.into();
        let archive_path = output_directory.join(archive_file_name(&name));
        Self {
            name,
            output_directory,
            compression,
            archive_path,
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    /// Builder identifier reported to the host.
    #[must_use]
    pub const fn builder_id(&self) -> &'static str {
        ARTIFACT_BUILDER_ID
    }

    /// Artifact id; archives carry none.
    #[must_use]
    pub const fn id(&self) -> &'static str {
        ""
    }

    /// Files making up the artifact.
    #[must_use]
    pub fn files(&self) -> Vec<&Path> {
        vec![self.archive_path.as_path()]
    }

    /// Recursively delete the output directory. A missing directory is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] when removal fails.
    pub fn cleanup(&self) -> AppResult<()> {
        remove_tree(&self.output_directory)
    }

    /// Host-facing alias for [`Artifact::cleanup`].
    ///
    /// # Errors
    ///
    /// See [`Artifact::cleanup`].
    pub fn destroy(&self) -> AppResult<()> {
        self.cleanup()
    }

    /// Write the artifact as pretty JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Manifest`] or [`AppError::Io`] on failure.
    pub fn write_manifest(&self, path: &Path) -> AppResult<()> {
        let body = serde_json::to_vec_pretty(self).map_err(|source| AppError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, body).map_err(|err| AppError::io("artifact.write_manifest", path, err))
    }

    /// Read an artifact previously written by [`Artifact::write_manifest`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] or [`AppError::Manifest`] on failure.
    pub fn read_manifest(path: &Path) -> AppResult<Self> {
        let body = fs::read(path).map_err(|err| AppError::io("artifact.read_manifest", path, err))?;
        serde_json::from_slice(&body).map_err(|source| AppError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Recursively delete `path`; a missing directory is not an error.
pub(crate) fn remove_tree(path: &Path) -> AppResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            info!(path = %path.display(), "workspace removed");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AppError::io("workspace.remove", path, err)),
    }
}

impl Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "New .wim file created in: {}",
            self.output_directory.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn surface_matches_host_expectations() {
        let artifact = Artifact::new("win10", "/work/wim", CompressionMode::Max, "golden");
        assert_eq!(artifact.builder_id(), "wimcap.post-processor.wim");
        assert_eq!(artifact.id(), "");
        assert_eq!(artifact.archive_path, PathBuf::from("/work/wim/win10.wim"));
        assert_eq!(artifact.files(), vec![Path::new("/work/wim/win10.wim")]);
        assert_eq!(artifact.to_string(), "New .wim file created in: /work/wim");
    }

    #[test]
    fn cleanup_removes_directory_and_tolerates_absence() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let workspace = root.path().join("wim");
        fs::create_dir_all(workspace.join("mount_leftover"))?;
        fs::write(workspace.join("win10.wim"), b"x")?;

        let artifact = Artifact::new("win10", &workspace, CompressionMode::Fast, "");
        artifact.cleanup()?;
        assert!(!workspace.exists());
        artifact.destroy()?;
        Ok(())
    }

    #[test]
    fn manifest_round_trips_through_json() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let artifact = Artifact::new("img", root.path(), CompressionMode::None, "desc");
        let manifest = root.path().join("artifact.json");
        artifact.write_manifest(&manifest)?;

        assert_eq!(Artifact::read_manifest(&manifest)?, artifact);
        Ok(())
    }
}
