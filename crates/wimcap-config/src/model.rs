//! Settings document and the effective profile derived from it.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wimcap_core::CompressionMode;

use crate::defaults::{DEFAULT_ARCHIVE_NAME, DEFAULT_OUTPUT_DIR};
use crate::error::{ConfigError, ConfigResult};

/// Raw capture settings as supplied by the host or a JSON document.
///
/// Every field is optional in the document; [`CaptureSettings::normalize`]
/// fills blanks before [`CaptureSettings::validate`] checks bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSettings {
    /// Image name recorded in the archive and used for the file name.
    pub name: String,
    /// Free-form description carried through to the artifact.
    pub description: String,
    /// Raw compression code; `0..=3`.
    pub compression: u32,
    /// Permit code `3` (LZMS) which DISM-based consumers cannot apply.
    pub allow_recovery_compression: bool,
    /// Mount tool used to attach the disk image.
    pub mount_backend: MountBackend,
    /// Workspace directory that receives the archive.
    pub output_dir: PathBuf,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            compression: CompressionMode::default().engine_code(),
            allow_recovery_compression: false,
            mount_backend: MountBackend::default(),
            output_dir: PathBuf::new(),
        }
    }
}

impl CaptureSettings {
    /// Fill blank fields with their defaults.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        let trimmed = self.name.trim();
        self.name = if trimmed.is_empty() {
            DEFAULT_ARCHIVE_NAME.to_string()
        } else {
            trimmed.to_string()
        };
        if self.output_dir.as_os_str().is_empty() {
            self.output_dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
        }
        self
    }

    /// Check bounds on normalised settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        crate::validate::validate_settings(self)
    }
}

/// Settings after defaulting and validation, with typed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureProfile {
    /// Image name; never blank and free of path separators.
    pub name: String,
    /// Artifact description.
    pub description: String,
    /// Compression mode passed to the archive engine.
    pub compression: CompressionMode,
    /// Mount tool used to attach the disk image.
    pub mount_backend: MountBackend,
    /// Workspace directory that receives the archive.
    pub output_dir: PathBuf,
    /// Adjustments applied during normalisation, for operator visibility.
    pub warnings: Vec<String>,
}

/// Tool used to attach a disk image read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountBackend {
    /// Windows DISM `/Mount-Image`.
    Dism,
    /// libguestfs `guestmount`.
    #[serde(rename = "guestmount")]
    GuestMount,
}

impl MountBackend {
    /// Stable identifier used in documents, env vars and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dism => "dism",
            Self::GuestMount => "guestmount",
        }
    }
}

impl Default for MountBackend {
    fn default() -> Self {
        if cfg!(windows) {
            Self::Dism
        } else {
            Self::GuestMount
        }
    }
}

impl Display for MountBackend {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for MountBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> ConfigResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dism" => Ok(Self::Dism),
            "guestmount" => Ok(Self::GuestMount),
            _ => Err(ConfigError::invalid(
                "mount_backend",
                value,
                "unknown_backend",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_fills_blank_name_and_output_dir() {
        let settings = CaptureSettings {
            name: "   ".into(),
            ..CaptureSettings::default()
        }
        .normalize();
        assert_eq!(settings.name, "default");
        assert_eq!(settings.output_dir, PathBuf::from("wim"));
    }

    #[test]
    fn normalize_trims_but_keeps_explicit_name() {
        let settings = CaptureSettings {
            name: " win10 ".into(),
            output_dir: PathBuf::from("out"),
            ..CaptureSettings::default()
        }
        .normalize();
        assert_eq!(settings.name, "win10");
        assert_eq!(settings.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn default_compression_is_lzx() {
        assert_eq!(CaptureSettings::default().compression, 2);
    }

    #[test]
    fn mount_backend_parses_case_insensitively() -> anyhow::Result<()> {
        assert_eq!("DISM".parse::<MountBackend>()?, MountBackend::Dism);
        assert_eq!(
            " guestmount ".parse::<MountBackend>()?,
            MountBackend::GuestMount
        );
        assert!("qemu-nbd".parse::<MountBackend>().is_err());
        Ok(())
    }

    #[test]
    fn mount_backend_serialises_lowercase() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&MountBackend::GuestMount)?,
            "\"guestmount\""
        );
        let parsed: MountBackend = serde_json::from_str("\"dism\"")?;
        assert_eq!(parsed, MountBackend::Dism);
        Ok(())
    }
}
