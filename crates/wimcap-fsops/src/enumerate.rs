//! Top-level source enumeration for a mounted tree.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;
use wimcap_core::CaptureSource;

use crate::error::{FsOpsError, FsOpsResult};

/// Maps the direct child directories of a mount point to capture sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceEnumerator;

impl SourceEnumerator {
    /// List child directories of `mount_point` in file-name order.
    ///
    /// Files and symbolic links are skipped, as are directories whose name is
    /// not valid UTF-8, since archive paths must be exact. An empty mount point
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Walkdir`] when the directory cannot be listed.
    pub fn enumerate(self, mount_point: &Path) -> FsOpsResult<Vec<CaptureSource>> {
        let walker = WalkDir::new(mount_point)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        let mut sources = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| FsOpsError::Walkdir {
                operation: "enumerate.read_dir",
                path: mount_point.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                warn!(path = %entry.path().display(), "skipping directory with non UTF-8 name");
                continue;
            };
            let source = CaptureSource::for_child(mount_point, name);
            debug!(local = %source.local_path.display(), archive = %source.archive_path, "capture source");
            sources.push(source);
        }
        Ok(sources)
    }
}
