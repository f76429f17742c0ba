//! Mount backends driving external tools.
//!
//! # Design
//! - One tool invocation per call; no state is kept between sessions.
//! - Program names are injectable so tests can substitute fake tools.
//! - The mount point must exist and be empty before a mount is attempted.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use wimcap_config::MountBackend;
use wimcap_core::DiskImageRef;

use crate::error::{FsOpsError, FsOpsResult};
use crate::session::MountSession;

/// Attach and detach disk images read-only.
#[async_trait]
pub trait MountService: Send + Sync {
    /// Attach the first volume of `image` at `mount_point`.
    async fn mount(&self, image: &DiskImageRef, mount_point: &Path) -> FsOpsResult<MountSession>;

    /// Detach a session, discarding writes when `discard_changes` is set.
    async fn unmount(&self, session: MountSession, discard_changes: bool) -> FsOpsResult<()>;
}

/// Build the default service for a configured backend.
#[must_use]
pub fn service_for_backend(backend: MountBackend) -> Arc<dyn MountService> {
    match backend {
        MountBackend::Dism => Arc::new(DismMountService::new()),
        MountBackend::GuestMount => Arc::new(GuestMountService::new()),
    }
}

const DISM_PROGRAM: &str = "dism";
const GUESTMOUNT_PROGRAM: &str = "guestmount";
const GUESTUNMOUNT_PROGRAM: &str = "guestunmount";

/// Windows DISM backend.
#[derive(Debug, Clone)]
pub struct DismMountService {
    program: String,
}

impl DismMountService {
    /// Use `dism` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(DISM_PROGRAM)
    }

    /// Use a specific DISM executable.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn mount_args(image: &Path, mount_point: &Path) -> Vec<OsString> {
        vec![
            OsString::from("/Mount-Image"),
            prefixed("/ImageFile:", image),
            OsString::from("/Index:1"),
            prefixed("/MountDir:", mount_point),
            OsString::from("/ReadOnly"),
        ]
    }

    fn unmount_args(mount_point: &Path, discard_changes: bool) -> Vec<OsString> {
        vec![
            OsString::from("/Unmount-Image"),
            prefixed("/MountDir:", mount_point),
            OsString::from(if discard_changes { "/Discard" } else { "/Commit" }),
        ]
    }
}

impl Default for DismMountService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MountService for DismMountService {
    async fn mount(&self, image: &DiskImageRef, mount_point: &Path) -> FsOpsResult<MountSession> {
        ensure_empty_dir(mount_point)?;
        run_tool(
            "mount.dism",
            &self.program,
            Self::mount_args(image.path(), mount_point),
        )
        .await?;
        info!(image = %image, mount_point = %mount_point.display(), "image mounted with dism");
        Ok(MountSession::new(image.clone(), mount_point.to_path_buf()))
    }

    async fn unmount(&self, session: MountSession, discard_changes: bool) -> FsOpsResult<()> {
        run_tool(
            "unmount.dism",
            &self.program,
            Self::unmount_args(session.mount_point(), discard_changes),
        )
        .await?;
        info!(mount_point = %session.mount_point().display(), "image unmounted with dism");
        Ok(())
    }
}

/// libguestfs backend for non-Windows hosts.
#[derive(Debug, Clone)]
pub struct GuestMountService {
    mount_program: String,
    unmount_program: String,
}

impl GuestMountService {
    /// Use `guestmount`/`guestunmount` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_programs(GUESTMOUNT_PROGRAM, GUESTUNMOUNT_PROGRAM)
    }

    /// Use specific mount and unmount executables.
    #[must_use]
    pub fn with_programs(mount: impl Into<String>, unmount: impl Into<String>) -> Self {
        Self {
            mount_program: mount.into(),
            unmount_program: unmount.into(),
        }
    }

    fn mount_args(image: &Path, mount_point: &Path) -> Vec<OsString> {
        vec![
            OsString::from("--ro"),
            OsString::from("-a"),
            image.as_os_str().to_os_string(),
            OsString::from("-i"),
            mount_point.as_os_str().to_os_string(),
        ]
    }
}

impl Default for GuestMountService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MountService for GuestMountService {
    async fn mount(&self, image: &DiskImageRef, mount_point: &Path) -> FsOpsResult<MountSession> {
        ensure_empty_dir(mount_point)?;
        run_tool(
            "mount.guestmount",
            &self.mount_program,
            Self::mount_args(image.path(), mount_point),
        )
        .await?;
        info!(image = %image, mount_point = %mount_point.display(), "image mounted with guestmount");
        Ok(MountSession::new(image.clone(), mount_point.to_path_buf()))
    }

    async fn unmount(&self, session: MountSession, _discard_changes: bool) -> FsOpsResult<()> {
        // Read-only mounts have nothing to commit.
        run_tool(
            "unmount.guestmount",
            &self.unmount_program,
            vec![session.mount_point().as_os_str().to_os_string()],
        )
        .await?;
        info!(mount_point = %session.mount_point().display(), "image unmounted with guestunmount");
        Ok(())
    }
}

fn prefixed(flag: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(path.as_os_str());
    arg
}

/// Reject mount points that are missing or already populated.
///
/// # Errors
///
/// Returns [`FsOpsError::MountPointNotReady`] or [`FsOpsError::Io`].
pub fn ensure_empty_dir(path: &Path) -> FsOpsResult<()> {
    if !path.is_dir() {
        return Err(FsOpsError::MountPointNotReady {
            path: path.to_path_buf(),
            reason: "missing",
        });
    }
    let mut entries = std::fs::read_dir(path).map_err(|source| FsOpsError::Io {
        operation: "mount.inspect_mount_point",
        path: path.to_path_buf(),
        source,
    })?;
    if entries.next().is_some() {
        return Err(FsOpsError::MountPointNotReady {
            path: path.to_path_buf(),
            reason: "not_empty",
        });
    }
    Ok(())
}

async fn run_tool(operation: &'static str, program: &str, args: Vec<OsString>) -> FsOpsResult<()> {
    debug!(operation, program, ?args, "running mount tool");
    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| FsOpsError::Spawn {
            operation,
            program: program.to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let diagnostic = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(FsOpsError::ToolFailed {
        operation,
        program: program.to_string(),
        status: output.status.code(),
        diagnostic,
    })
}
