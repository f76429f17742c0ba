//! Filesystem side of a capture run: workspace, mounting and enumeration.
#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

pub mod enumerate;
pub mod error;
pub mod mount;
pub mod session;
pub mod workspace;

pub use enumerate::SourceEnumerator;
pub use error::{FsOpsError, FsOpsResult};
pub use mount::{
    DismMountService, GuestMountService, MountService, ensure_empty_dir, service_for_backend,
};
pub use session::MountSession;
pub use workspace::{MountPoint, prepare_workspace};
