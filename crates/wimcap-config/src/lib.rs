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

//! File- and environment-backed configuration for capture runs.
//!
//! Layout: `model.rs` (raw settings document and effective profile),
//! `validate.rs` (defaulting and bounds checks), `loader.rs` (JSON file and
//! environment overrides), `defaults.rs` (fallback values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::{DEFAULT_ARCHIVE_NAME, DEFAULT_OUTPUT_DIR};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_PREFIX, apply_env_overrides, apply_process_env, load_settings};
pub use model::{CaptureProfile, CaptureSettings, MountBackend};
pub use validate::normalize_capture_settings;
