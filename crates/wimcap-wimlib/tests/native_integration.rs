#![cfg(feature = "wimlib")]

use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use tempfile::TempDir;
use wimcap_core::{CaptureRequest, CaptureSource, CompressionMode};
use wimcap_test_support::fixtures::{build_mount_tree, tree_snapshot, wimlib_available, wimlib_imagex};
use wimcap_wimlib::{ArchiveWriter, EnginePhase, NativeEngine};

fn apply(archive: &std::path::Path, target: &std::path::Path) -> Result<()> {
    let output = Command::new(wimlib_imagex())
        .arg("apply")
        .arg(archive)
        .arg("1")
        .arg(target)
        .output()
        .context("spawn wimlib-imagex apply")?;
    ensure!(
        output.status.success(),
        "wimlib-imagex apply failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(())
}

#[test]
fn captured_subdirectories_round_trip_through_apply() -> Result<()> {
    if !wimlib_available() {
        eprintln!("skipping native round trip: wimlib-imagex unavailable");
        return Ok(());
    }

    let mount = TempDir::new()?;
    build_mount_tree(
        mount.path(),
        &[
            ("A/readme.txt", "alpha"),
            ("A/nested/data.bin", "0123456789"),
            ("B/", ""),
            ("B/config.ini", "[core]\nkey=value\n"),
        ],
    )?;
    let out = TempDir::new()?;
    let archive = out.path().join("roundtrip.wim");
    let request = CaptureRequest::new(
        "roundtrip",
        CompressionMode::Max,
        vec![
            CaptureSource::for_child(mount.path(), "A"),
            CaptureSource::for_child(mount.path(), "B"),
        ],
        &archive,
    );

    ArchiveWriter::new(Arc::new(NativeEngine)).capture(&request)?;
    ensure!(archive.is_file(), "archive not written");

    let applied = TempDir::new()?;
    apply(&archive, applied.path())?;
    assert_eq!(
        tree_snapshot(&applied.path().join("A"))?,
        tree_snapshot(&mount.path().join("A"))?
    );
    assert_eq!(
        tree_snapshot(&applied.path().join("B"))?,
        tree_snapshot(&mount.path().join("B"))?
    );
    Ok(())
}

#[test]
fn empty_source_list_writes_empty_image() -> Result<()> {
    if !wimlib_available() {
        eprintln!("skipping native empty image: wimlib-imagex unavailable");
        return Ok(());
    }

    let out = TempDir::new()?;
    let archive = out.path().join("empty.wim");
    let request = CaptureRequest::new("empty", CompressionMode::Fast, Vec::new(), &archive);
    ArchiveWriter::new(Arc::new(NativeEngine)).capture(&request)?;

    let applied = TempDir::new()?;
    apply(&archive, applied.path())?;
    assert!(tree_snapshot(applied.path())?.is_empty());
    Ok(())
}

#[test]
fn missing_source_fails_in_add_phase_with_engine_status() -> Result<()> {
    if !wimlib_available() {
        return Ok(());
    }

    let mount = TempDir::new()?;
    let out = TempDir::new()?;
    let request = CaptureRequest::new(
        "broken",
        CompressionMode::None,
        vec![CaptureSource::for_child(mount.path(), "DoesNotExist")],
        out.path().join("broken.wim"),
    );

    let err = ArchiveWriter::new(Arc::new(NativeEngine))
        .capture(&request)
        .expect_err("missing source");
    assert_eq!(err.phase(), EnginePhase::Add);
    assert!(err.status().is_some_and(|status| status != 0));
    Ok(())
}
