//! Bounds checks and the settings-to-profile normalisation step.

use wimcap_core::CompressionMode;

use crate::defaults::{DEFAULT_ARCHIVE_NAME, MAX_COMPRESSION_CODE};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{CaptureProfile, CaptureSettings};

const NAME_FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

pub(crate) fn validate_settings(settings: &CaptureSettings) -> ConfigResult<()> {
    if settings.compression > MAX_COMPRESSION_CODE {
        return Err(ConfigError::invalid(
            "compression",
            settings.compression,
            "out_of_range",
        ));
    }
    if settings.compression == CompressionMode::Recovery.engine_code()
        && !settings.allow_recovery_compression
    {
        return Err(ConfigError::invalid(
            "compression",
            settings.compression,
            "recovery_not_allowed",
        ));
    }
    if settings.name.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            field: "name",
            value: None,
            reason: "empty",
        });
    }
    if settings.name.contains(NAME_FORBIDDEN) || settings.name == "." || settings.name == ".." {
        return Err(ConfigError::invalid(
            "name",
            &settings.name,
            "invalid_file_name",
        ));
    }
    if settings.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::InvalidField {
            field: "output_dir",
            value: None,
            reason: "empty",
        });
    }
    Ok(())
}

/// Default, validate and type a settings document.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when a field is out of bounds after
/// defaults are applied.
pub fn normalize_capture_settings(settings: CaptureSettings) -> ConfigResult<CaptureProfile> {
    let mut warnings = Vec::new();
    if settings.name.trim().is_empty() {
        warnings.push(format!(
            "name is blank; using '{DEFAULT_ARCHIVE_NAME}'"
        ));
    }
    if settings.output_dir.as_os_str().is_empty() {
        warnings.push("output_dir is blank; using the default workspace".to_string());
    }

    let settings = settings.normalize();
    settings.validate()?;

    let compression = CompressionMode::try_from(settings.compression).map_err(|_| {
        ConfigError::invalid("compression", settings.compression, "out_of_range")
    })?;
    if compression == CompressionMode::Recovery {
        warnings.push(
            "compression 3 (lzms) produces archives that DISM cannot apply".to_string(),
        );
    }

    Ok(CaptureProfile {
        name: settings.name,
        description: settings.description,
        compression,
        mount_backend: settings.mount_backend,
        output_dir: settings.output_dir,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn settings(compression: u32) -> CaptureSettings {
        CaptureSettings {
            name: "win10".into(),
            compression,
            output_dir: PathBuf::from("out"),
            ..CaptureSettings::default()
        }
    }

    #[test]
    fn compression_above_three_is_rejected() {
        let err = normalize_capture_settings(settings(4)).expect_err("out of range");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "compression",
                reason: "out_of_range",
                ..
            }
        ));
    }

    #[test]
    fn recovery_compression_requires_opt_in() -> anyhow::Result<()> {
        let err = normalize_capture_settings(settings(3)).expect_err("opt-in required");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                reason: "recovery_not_allowed",
                ..
            }
        ));

        let profile = normalize_capture_settings(CaptureSettings {
            allow_recovery_compression: true,
            ..settings(3)
        })?;
        assert_eq!(profile.compression, CompressionMode::Recovery);
        assert_eq!(profile.warnings.len(), 1);
        Ok(())
    }

    #[test]
    fn blank_name_defaults_with_warning() -> anyhow::Result<()> {
        let profile = normalize_capture_settings(CaptureSettings::default())?;
        assert_eq!(profile.name, "default");
        assert_eq!(profile.compression, CompressionMode::Max);
        assert_eq!(profile.output_dir, PathBuf::from("wim"));
        assert!(profile.warnings.iter().any(|w| w.contains("name is blank")));
        Ok(())
    }

    #[test]
    fn names_with_path_separators_are_rejected() {
        for name in ["a/b", "a\\b", "..", "c:"] {
            let err = normalize_capture_settings(CaptureSettings {
                name: name.into(),
                ..CaptureSettings::default()
            })
            .expect_err("separator rejected");
            assert!(matches!(
                err,
                ConfigError::InvalidField { field: "name", .. }
            ));
        }
    }

    #[test]
    fn validate_rejects_blank_output_dir_without_normalize() {
        let raw = CaptureSettings {
            output_dir: PathBuf::new(),
            ..settings(1)
        };
        let err = raw.validate().expect_err("blank output dir");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "output_dir",
                reason: "empty",
                ..
            }
        ));
    }

    #[test]
    fn description_is_carried_through() -> anyhow::Result<()> {
        let profile = normalize_capture_settings(CaptureSettings {
            description: "nightly".into(),
            ..settings(0)
        })?;
        assert_eq!(profile.description, "nightly");
        assert_eq!(profile.compression, CompressionMode::None);
        assert!(profile.warnings.is_empty());
        Ok(())
    }
}
