//! Manifest-writing engine used when the native library is not linked.
//!
//! The "archive" is a JSON document listing every captured entry, which is
//! enough to exercise and inspect the capture pipeline end to end.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;
use wimcap_core::{CaptureSource, CompressionMode};

use super::{ImageHandle, WimEngine};
use crate::error::{EnginePhase, WimlibError, WimlibResult};

/// Value of [`StubManifest::format`].
pub const STUB_FORMAT: &str = "wimcap-stub-manifest/1";

/// Engine that records captures as JSON manifests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubEngine;

impl WimEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn create_image(&self, compression: CompressionMode) -> WimlibResult<Box<dyn ImageHandle>> {
        Ok(Box::new(StubHandle {
            manifest: StubManifest {
                format: STUB_FORMAT.to_string(),
                compression,
                images: Vec::new(),
            },
        }))
    }
}

/// Serialised stub archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubManifest {
    /// Manifest format marker.
    pub format: String,
    /// Compression requested at creation.
    pub compression: CompressionMode,
    /// Captured images, in capture order.
    pub images: Vec<StubImage>,
}

impl StubManifest {
    /// Read a manifest previously written by the stub engine.
    ///
    /// # Errors
    ///
    /// Returns [`WimlibError::Io`] or [`WimlibError::Manifest`].
    pub fn load(path: &Path) -> WimlibResult<Self> {
        let file = File::open(path).map_err(|source| WimlibError::Io {
            phase: EnginePhase::Write,
            operation: "stub.open_manifest",
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(file).map_err(|source| WimlibError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One captured image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubImage {
    /// Image name.
    pub name: String,
    /// Sources merged into the image.
    pub sources: Vec<StubSource>,
}

/// One captured subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubSource {
    /// Destination inside the image.
    pub archive_path: String,
    /// Files and directories below the source root, relative to it.
    pub entries: Vec<StubEntry>,
}

impl StubSource {
    /// Where `entry` lands when the image is laid out under `root`.
    #[must_use]
    pub fn destination(&self, root: &Path, entry: &StubEntry) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(self.archive_path.split('\\').filter(|part| !part.is_empty()));
        path.extend(entry.path.split('/'));
        path
    }
}

/// One captured file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubEntry {
    /// Path relative to the source root, `/` separated.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// File length in bytes; zero for directories.
    pub size: u64,
}

struct StubHandle {
    manifest: StubManifest,
}

impl ImageHandle for StubHandle {
    fn add_sources(&mut self, sources: &[CaptureSource], image_name: &str) -> WimlibResult<()> {
        let sources = sources
            .iter()
            .map(capture_source)
            .collect::<WimlibResult<Vec<_>>>()?;
        debug!(image = image_name, sources = sources.len(), "stub image captured");
        self.manifest.images.push(StubImage {
            name: image_name.to_string(),
            sources,
        });
        Ok(())
    }

    fn write(&mut self, output_path: &Path) -> WimlibResult<()> {
        let file = File::create(output_path).map_err(|source| WimlibError::Io {
            phase: EnginePhase::Write,
            operation: "stub.create_manifest",
            path: output_path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.manifest).map_err(|source| {
            WimlibError::Manifest {
                path: output_path.to_path_buf(),
                source,
            }
        })?;
        writer.flush().map_err(|source| WimlibError::Io {
            phase: EnginePhase::Write,
            operation: "stub.flush_manifest",
            path: output_path.to_path_buf(),
            source,
        })
    }
}

fn capture_source(source: &CaptureSource) -> WimlibResult<StubSource> {
    let root = &source.local_path;
    let metadata = fs::symlink_metadata(root).map_err(|err| WimlibError::Io {
        phase: EnginePhase::Add,
        operation: "stub.stat_source",
        path: root.clone(),
        source: err,
    })?;
    if !metadata.is_dir() {
        return Err(WimlibError::InvalidArgument {
            phase: EnginePhase::Add,
            value: root.clone(),
            reason: "source_not_directory",
        });
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| WimlibError::Walk {
            path: root.clone(),
            source,
        })?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let is_dir = entry.file_type().is_dir();
        let size = if is_dir {
            0
        } else {
            entry
                .metadata()
                .map_err(|source| WimlibError::Walk {
                    path: root.clone(),
                    source,
                })?
                .len()
        };
        entries.push(StubEntry {
            path: slash_path(relative),
            is_dir,
            size,
        });
    }

    Ok(StubSource {
        archive_path: source.archive_path.clone(),
        entries,
    })
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn manifest_lists_nested_entries_per_source() -> anyhow::Result<()> {
        let mount = TempDir::new()?;
        fs::create_dir_all(mount.path().join("App/bin"))?;
        fs::write(mount.path().join("App/bin/app.exe"), b"12345")?;
        fs::create_dir(mount.path().join("Empty"))?;
        let out = TempDir::new()?;
        let output = out.path().join("image.wim");

        let mut handle = StubEngine.create_image(CompressionMode::Fast)?;
        handle.add_sources(
            &[
                CaptureSource::for_child(mount.path(), "App"),
                CaptureSource::for_child(mount.path(), "Empty"),
            ],
            "win10",
        )?;
        handle.write(&output)?;
        drop(handle);

        let manifest = StubManifest::load(&output)?;
        assert_eq!(manifest.format, STUB_FORMAT);
        assert_eq!(manifest.compression, CompressionMode::Fast);
        assert_eq!(manifest.images.len(), 1);
        let image = &manifest.images[0];
        assert_eq!(image.name, "win10");
        assert_eq!(image.sources[0].archive_path, "\\App");
        assert_eq!(
            image.sources[0].entries,
            vec![
                StubEntry {
                    path: "bin".into(),
                    is_dir: true,
                    size: 0
                },
                StubEntry {
                    path: "bin/app.exe".into(),
                    is_dir: false,
                    size: 5
                },
            ]
        );
        assert!(image.sources[1].entries.is_empty());
        assert_eq!(
            image.sources[0].destination(Path::new("/x"), &image.sources[0].entries[1]),
            Path::new("/x/App/bin/app.exe")
        );
        Ok(())
    }

    #[test]
    fn empty_source_list_produces_empty_image() -> anyhow::Result<()> {
        let out = TempDir::new()?;
        let output = out.path().join("empty.wim");
        let mut handle = StubEngine.create_image(CompressionMode::Max)?;
        handle.add_sources(&[], "default")?;
        handle.write(&output)?;

        let manifest = StubManifest::load(&output)?;
        assert_eq!(manifest.images.len(), 1);
        assert!(manifest.images[0].sources.is_empty());
        Ok(())
    }

    #[test]
    fn missing_source_fails_in_add_phase() -> anyhow::Result<()> {
        let mount = TempDir::new()?;
        let mut handle = StubEngine.create_image(CompressionMode::None)?;
        let err = handle
            .add_sources(&[CaptureSource::for_child(mount.path(), "Gone")], "x")
            .expect_err("missing source");
        assert_eq!(err.phase(), EnginePhase::Add);
        Ok(())
    }

    #[test]
    fn unwritable_destination_fails_in_write_phase() -> anyhow::Result<()> {
        let out = TempDir::new()?;
        let mut handle = StubEngine.create_image(CompressionMode::None)?;
        handle.add_sources(&[], "x")?;
        let err = handle
            .write(&out.path().join("missing-dir/x.wim"))
            .expect_err("no parent");
        assert_eq!(err.phase(), EnginePhase::Write);
        Ok(())
    }
}
