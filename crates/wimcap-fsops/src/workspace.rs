//! Workspace and ephemeral mount-point directories.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{FsOpsError, FsOpsResult};

const MOUNT_DIR_PREFIX: &str = "mount_";

/// Create the workspace directory if it does not exist.
///
/// # Errors
///
/// Returns [`FsOpsError::Io`] when the directory cannot be created.
pub fn prepare_workspace(path: &Path) -> FsOpsResult<()> {
    fs::create_dir_all(path).map_err(|source| FsOpsError::Io {
        operation: "workspace.create",
        path: path.to_path_buf(),
        source,
    })
}

/// Uniquely named, initially empty directory used as a mount target.
///
/// The directory is removed by [`MountPoint::release`]; it is deliberately
/// left in place if the guard is dropped without release.
#[derive(Debug)]
pub struct MountPoint {
    path: PathBuf,
}

impl MountPoint {
    /// Create `mount_<uuid>` under `workspace`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the directory cannot be created.
    pub fn create(workspace: &Path) -> FsOpsResult<Self> {
        let path = workspace.join(format!("{MOUNT_DIR_PREFIX}{}", Uuid::new_v4().simple()));
        fs::create_dir(&path).map_err(|source| FsOpsError::Io {
            operation: "mount_point.create",
            path: path.clone(),
            source,
        })?;
        debug!(mount_point = %path.display(), "mount point created");
        Ok(Self { path })
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory.
    ///
    /// With `detached` the image is known to be released and the tree is
    /// removed recursively. Otherwise only an empty directory is removed so
    /// content of a still-attached image is never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when removal fails.
    pub fn release(self, detached: bool) -> FsOpsResult<()> {
        let result = if detached {
            fs::remove_dir_all(&self.path)
        } else {
            fs::remove_dir(&self.path)
        };
        result.map_err(|source| {
            warn!(mount_point = %self.path.display(), error = %source, "mount point not removed");
            FsOpsError::Io {
                operation: "mount_point.remove",
                path: self.path.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn mount_points_are_unique_and_prefixed() -> anyhow::Result<()> {
        let workspace = TempDir::new()?;
        let first = MountPoint::create(workspace.path())?;
        let second = MountPoint::create(workspace.path())?;
        assert_ne!(first.path(), second.path());
        let name = first
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        assert!(name.starts_with("mount_"));
        assert!(first.path().is_dir());
        Ok(())
    }

    #[test]
    fn release_after_detach_removes_tree() -> anyhow::Result<()> {
        let workspace = TempDir::new()?;
        let mount = MountPoint::create(workspace.path())?;
        let path = mount.path().to_path_buf();
        fs::write(path.join("leftover"), b"x")?;
        mount.release(true)?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn release_without_detach_keeps_populated_directory() -> anyhow::Result<()> {
        let workspace = TempDir::new()?;
        let mount = MountPoint::create(workspace.path())?;
        let path = mount.path().to_path_buf();
        fs::write(path.join("still-mounted"), b"x")?;
        assert!(mount.release(false).is_err());
        assert!(path.join("still-mounted").exists());
        Ok(())
    }

    #[test]
    fn prepare_workspace_is_idempotent() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let workspace = root.path().join("nested/wim");
        prepare_workspace(&workspace)?;
        prepare_workspace(&workspace)?;
        assert!(workspace.is_dir());
        Ok(())
    }
}
