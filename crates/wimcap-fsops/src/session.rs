//! Active mount sessions.

use std::path::{Path, PathBuf};

use wimcap_core::DiskImageRef;

/// A disk image attached at a mount point.
///
/// Not `Clone`: [`crate::MountService::unmount`] takes the session by value,
/// so a session can be released at most once.
#[derive(Debug)]
pub struct MountSession {
    image: DiskImageRef,
    mount_point: PathBuf,
}

impl MountSession {
    /// Record a successful mount. Intended for [`crate::MountService`]
    /// implementations.
    #[must_use]
    pub const fn new(image: DiskImageRef, mount_point: PathBuf) -> Self {
        Self { image, mount_point }
    }

    /// Image attached by this session.
    #[must_use]
    pub const fn image(&self) -> &DiskImageRef {
        &self.image
    }

    /// Directory exposing the image's filesystem.
    #[must_use]
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}
