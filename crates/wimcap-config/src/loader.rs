//! JSON document loading and environment overrides.
//!
//! # Design
//! - Overrides read through an injected lookup so tests never touch the
//!   process environment.
//! - Unparseable override values fail loudly instead of being skipped.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{CaptureSettings, MountBackend};

/// Prefix shared by every recognised environment override.
pub const ENV_PREFIX: &str = "WIMCAP_";

/// Read and parse a settings document.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read and
/// [`ConfigError::Parse`] when it is not a valid settings document.
pub fn load_settings(path: impl AsRef<Path>) -> ConfigResult<CaptureSettings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    let settings = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded capture settings");
    Ok(settings)
}

/// Apply `WIMCAP_*` overrides resolved through `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when an override value cannot be
/// parsed for its field.
pub fn apply_env_overrides<F>(
    mut settings: CaptureSettings,
    lookup: F,
) -> ConfigResult<CaptureSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

    if let Some(name) = var("NAME") {
        settings.name = name;
    }
    if let Some(description) = var("DESCRIPTION") {
        settings.description = description;
    }
    if let Some(raw) = var("COMPRESSION") {
        settings.compression = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid("compression", &raw, "not_an_integer"))?;
    }
    if let Some(dir) = var("OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(dir);
    }
    if let Some(raw) = var("MOUNT_BACKEND") {
        settings.mount_backend = raw.parse::<MountBackend>()?;
    }
    Ok(settings)
}

/// Apply overrides from the current process environment.
///
/// # Errors
///
/// Propagates [`apply_env_overrides`] failures.
pub fn apply_process_env(settings: CaptureSettings) -> ConfigResult<CaptureSettings> {
    apply_env_overrides(settings, |key| std::env::var(key).ok())
}
