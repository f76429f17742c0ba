//! Default values applied while normalising capture settings.
//!
//! # Design
//! - Centralize fallbacks so the loader, validator and CLI stay consistent.

/// Archive name used when the configured name is blank.
pub const DEFAULT_ARCHIVE_NAME: &str = "default";
/// Workspace directory, relative to the current directory, used when unset.
pub const DEFAULT_OUTPUT_DIR: &str = "wim";
/// Highest compression code understood by the archive engine.
pub(crate) const MAX_COMPRESSION_CODE: u32 = 3;
