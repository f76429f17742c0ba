use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use wimcap_config::{
    ConfigError, MountBackend, apply_env_overrides, load_settings, normalize_capture_settings,
};
use wimcap_core::CompressionMode;

#[test]
fn file_then_env_then_normalize_produces_profile() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("wimcap.json");
    fs::write(
        &path,
        r#"{
            "name": "win10",
            "description": "golden image",
            "compression": 2,
            "mount_backend": "guestmount"
        }"#,
    )?;

    let settings = load_settings(&path)?;
    let settings = apply_env_overrides(settings, |key| {
        (key == "WIMCAP_COMPRESSION").then(|| "1".to_string())
    })?;
    let profile = normalize_capture_settings(settings)?;

    assert_eq!(profile.name, "win10");
    assert_eq!(profile.description, "golden image");
    assert_eq!(profile.compression, CompressionMode::Fast);
    assert_eq!(profile.mount_backend, MountBackend::GuestMount);
    assert_eq!(profile.output_dir, PathBuf::from("wim"));
    Ok(())
}

#[test]
fn unknown_fields_are_rejected() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("wimcap.json");
    fs::write(&path, r#"{ "name": "x", "skip_clean": true }"#)?;

    let err = load_settings(&path).expect_err("unknown field");
    assert!(matches!(err, ConfigError::Parse { .. }));
    Ok(())
}

#[test]
fn out_of_range_compression_in_document_fails_before_pipeline() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("wimcap.json");
    fs::write(&path, r#"{ "compression": 7 }"#)?;

    let settings = load_settings(&path)?;
    let err = normalize_capture_settings(settings).expect_err("out of range");
    assert!(matches!(
        err,
        ConfigError::InvalidField {
            field: "compression",
            ..
        }
    ));
    Ok(())
}

#[test]
fn empty_document_uses_defaults() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("wimcap.json");
    fs::write(&path, "{}")?;

    let profile = normalize_capture_settings(load_settings(&path)?)?;
    assert_eq!(profile.name, "default");
    assert_eq!(profile.compression, CompressionMode::Max);
    Ok(())
}
