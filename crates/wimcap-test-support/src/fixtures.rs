//! Filesystem fixtures and tool probes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Returns `true` if `wimlib-imagex` can be executed.
///
/// `WIMLIB_IMAGEX` overrides the program name.
#[must_use]
pub fn wimlib_available() -> bool {
    Command::new(wimlib_imagex())
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Program used to apply archives in round-trip tests.
#[must_use]
pub fn wimlib_imagex() -> String {
    std::env::var("WIMLIB_IMAGEX").unwrap_or_else(|_| "wimlib-imagex".to_string())
}

/// Create a tree under `root`.
///
/// Each entry is a `/` separated relative path. Paths ending in `/` become
/// directories; all others become files holding the given text.
///
/// # Errors
///
/// Returns an error when a directory or file cannot be created.
pub fn build_mount_tree(root: &Path, layout: &[(&str, &str)]) -> Result<()> {
    for (relative, contents) in layout {
        let path = root.join(relative.trim_end_matches('/'));
        if relative.ends_with('/') {
            fs::create_dir_all(&path).with_context(|| format!("mkdir {}", path.display()))?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("mkdir {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

/// Copy every file and directory under `from` into `to`.
///
/// # Errors
///
/// Returns an error when traversal or copying fails.
pub fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Map of relative `/` separated path to file contents; directories map to
/// `None`.
///
/// # Errors
///
/// Returns an error when traversal or reading fails.
pub fn tree_snapshot(root: &Path) -> Result<BTreeMap<String, Option<Vec<u8>>>> {
    let mut snapshot = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(root)?
            .components()
            .map(|part| part.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let contents = if entry.file_type().is_dir() {
            None
        } else {
            Some(fs::read(entry.path())?)
        };
        snapshot.insert(relative, contents);
    }
    Ok(snapshot)
}
