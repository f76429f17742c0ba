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

//! Logging setup shared by the wimcap binary and its tests.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (process and
//! run spans), `error.rs` (failure type).

pub mod context;
pub mod error;
pub mod init;

pub use context::{GlobalContextGuard, capture_span};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
