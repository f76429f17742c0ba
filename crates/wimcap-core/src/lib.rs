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

//! Engine-agnostic capture domain types shared across the wimcap workspace.
//!
//! Layout: `model/` (disk images, capture sources, requests, compression modes,
//! upstream builder artifacts), `error.rs` (validation errors for those types).

pub mod error;
pub mod model;

pub use error::{CoreError, CoreResult};
pub use model::{
    ARCHIVE_EXTENSION, BuilderKind, CaptureRequest, CaptureSource, CompressionMode, DiskImageRef,
    UpstreamArtifact, archive_file_name,
};
