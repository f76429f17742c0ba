//! Core capture domain types and DTOs shared across the workspace.
//!
//! # Design
//! - Values are immutable once constructed; validation happens in constructors.
//! - No IO beyond path normalisation; callers own every filesystem side effect.

use std::ffi::OsStr;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// File extension used for produced archives.
pub const ARCHIVE_EXTENSION: &str = "wim";

/// Disk image extensions accepted from the Hyper-V builder family.
const DISK_IMAGE_EXTENSIONS: &[&str] = &["vhd", "vhdx"];

const HYPERV_BUILDER_ID: &str = "MSOpenTech.hyperv";
const QEMU_BUILDER_ID: &str = "transcend.qemu";

/// File name of the archive produced for `archive_name`.
#[must_use]
pub fn archive_file_name(archive_name: &str) -> String {
    format!("{archive_name}.{ARCHIVE_EXTENSION}")
}

/// Compression applied by the archive engine when serialising an image.
///
/// Discriminants match the engine's `wimlib_compression_type` enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum CompressionMode {
    /// Store resources uncompressed.
    None = 0,
    /// XPRESS compression; fast, moderate ratio.
    Fast = 1,
    /// LZX compression; slower, better ratio.
    #[default]
    Max = 2,
    /// LZMS solid compression; not applicable by DISM-based tooling.
    Recovery = 3,
}

impl CompressionMode {
    /// Integer code passed across the FFI boundary.
    #[must_use]
    pub const fn engine_code(self) -> u32 {
        self as u32
    }

    /// Human-readable name of the underlying codec.
    #[must_use]
    pub const fn codec_name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fast => "xpress",
            Self::Max => "lzx",
            Self::Recovery => "lzms",
        }
    }
}

impl TryFrom<u32> for CompressionMode {
    type Error = CoreError;

    fn try_from(value: u32) -> CoreResult<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Fast),
            2 => Ok(Self::Max),
            3 => Ok(Self::Recovery),
            other => Err(CoreError::UnknownCompression { value: other }),
        }
    }
}

impl From<CompressionMode> for u32 {
    fn from(mode: CompressionMode) -> Self {
        mode.engine_code()
    }
}

impl Display for CompressionMode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.codec_name())
    }
}

/// Builder family that produced the upstream artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderKind {
    /// Hyper-V builder; produces `.vhd`/`.vhdx` disks.
    HyperV,
    /// QEMU builder; recognised but not capturable.
    Qemu,
    /// Any other builder identifier.
    Other(String),
}

impl BuilderKind {
    /// Classify an upstream builder identifier.
    #[must_use]
    pub fn from_builder_id(builder_id: &str) -> Self {
        match builder_id {
            HYPERV_BUILDER_ID => Self::HyperV,
            QEMU_BUILDER_ID => Self::Qemu,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether images from this builder can be mounted and captured.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        matches!(self, Self::HyperV)
    }

    /// Identifier string as reported by the host.
    #[must_use]
    pub fn builder_id(&self) -> &str {
        match self {
            Self::HyperV => HYPERV_BUILDER_ID,
            Self::Qemu => QEMU_BUILDER_ID,
            Self::Other(id) => id,
        }
    }
}

/// Artifact handed over by the upstream build stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamArtifact {
    /// Identifier of the builder that produced the artifact.
    pub builder_id: String,
    /// Files belonging to the artifact, in host order.
    pub files: Vec<PathBuf>,
}

impl UpstreamArtifact {
    /// Construct an upstream artifact description.
    #[must_use]
    pub fn new(builder_id: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            builder_id: builder_id.into(),
            files,
        }
    }

    /// Classified builder family.
    #[must_use]
    pub fn builder_kind(&self) -> BuilderKind {
        BuilderKind::from_builder_id(&self.builder_id)
    }

    /// First file carrying a disk image extension, if any.
    #[must_use]
    pub fn disk_image(&self) -> Option<&Path> {
        self.files
            .iter()
            .map(PathBuf::as_path)
            .find(|path| has_disk_image_extension(path))
    }
}

fn has_disk_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            DISK_IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Absolute path to a disk image accepted for mounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskImageRef {
    path: PathBuf,
}

impl DiskImageRef {
    /// Validate and absolutise a disk image path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidImagePath`] when the extension is not
    /// `.vhd`/`.vhdx` or the path cannot be made absolute.
    pub fn new(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if !has_disk_image_extension(path) {
            return Err(CoreError::InvalidImagePath {
                path: path.to_path_buf(),
                reason: "unsupported_extension",
            });
        }
        let absolute = std::path::absolute(path).map_err(|_| CoreError::InvalidImagePath {
            path: path.to_path_buf(),
            reason: "not_absolutisable",
        })?;
        Ok(Self { path: absolute })
    }

    /// Absolute path of the image file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Display for DiskImageRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.path.display())
    }
}

/// One subtree recorded into the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSource {
    /// Absolute path of the subtree under the mount point.
    pub local_path: PathBuf,
    /// Logical location of the subtree inside the archive.
    pub archive_path: String,
}

impl CaptureSource {
    /// Build the conventional source for a direct child of `root`.
    #[must_use]
    pub fn for_child(root: &Path, child_name: &str) -> Self {
        Self {
            local_path: root.join(child_name),
            archive_path: format!("\\{child_name}"),
        }
    }
}

/// Immutable description of one archive capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    archive_name: String,
    compression: CompressionMode,
    sources: Vec<CaptureSource>,
    output_path: PathBuf,
}

impl CaptureRequest {
    /// Assemble a capture request.
    #[must_use]
    pub fn new(
        archive_name: impl Into<String>,
        compression: CompressionMode,
        sources: Vec<CaptureSource>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            archive_name: archive_name.into(),
            compression,
            sources,
            output_path: output_path.into(),
        }
    }

    /// Image name recorded inside the archive.
    #[must_use]
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Compression mode for the archive.
    #[must_use]
    pub const fn compression(&self) -> CompressionMode {
        self.compression
    }

    /// Sources captured into the image, in enumeration order.
    #[must_use]
    pub fn sources(&self) -> &[CaptureSource] {
        &self.sources
    }

    /// Destination file of the archive.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_mode_round_trips_engine_codes() {
        for code in 0..=3_u32 {
            let mode = CompressionMode::try_from(code).expect("known code");
            assert_eq!(mode.engine_code(), code);
        }
        assert!(matches!(
            CompressionMode::try_from(4),
            Err(CoreError::UnknownCompression { value: 4 })
        ));
    }

    #[test]
    fn compression_mode_deserialises_from_integer() -> anyhow::Result<()> {
        let mode: CompressionMode = serde_json::from_str("1")?;
        assert_eq!(mode, CompressionMode::Fast);
        assert!(serde_json::from_str::<CompressionMode>("9").is_err());
        assert_eq!(serde_json::to_string(&CompressionMode::Max)?, "2");
        Ok(())
    }

    #[test]
    fn builder_kind_classifies_known_ids() {
        assert_eq!(
            BuilderKind::from_builder_id("MSOpenTech.hyperv"),
            BuilderKind::HyperV
        );
        assert_eq!(
            BuilderKind::from_builder_id("transcend.qemu"),
            BuilderKind::Qemu
        );
        let other = BuilderKind::from_builder_id("mitchellh.virtualbox");
        assert!(!other.is_supported());
        assert_eq!(other.builder_id(), "mitchellh.virtualbox");
        assert!(BuilderKind::HyperV.is_supported());
        assert!(!BuilderKind::Qemu.is_supported());
    }

    #[test]
    fn upstream_selects_first_disk_image_regardless_of_position() {
        let artifact = UpstreamArtifact::new(
            "MSOpenTech.hyperv",
            vec![
                PathBuf::from("out/Virtual Machines/box.vmcx"),
                PathBuf::from("out/Virtual Hard Disks/disk.VHDX"),
                PathBuf::from("out/Virtual Hard Disks/other.vhd"),
            ],
        );
        assert_eq!(
            artifact.disk_image(),
            Some(Path::new("out/Virtual Hard Disks/disk.VHDX"))
        );
    }

    #[test]
    fn upstream_without_disk_image_selects_nothing() {
        let artifact = UpstreamArtifact::new(
            "MSOpenTech.hyperv",
            vec![PathBuf::from("box.vmcx"), PathBuf::from("notes.vhd.txt")],
        );
        assert!(artifact.disk_image().is_none());
    }

    #[test]
    fn disk_image_ref_rejects_other_extensions() {
        let err = DiskImageRef::new("disk.qcow2").expect_err("qcow2 rejected");
        assert!(matches!(
            err,
            CoreError::InvalidImagePath {
                reason: "unsupported_extension",
                ..
            }
        ));
    }

    #[test]
    fn disk_image_ref_is_absolute() -> anyhow::Result<()> {
        let image = DiskImageRef::new("relative/disk.vhdx")?;
        assert!(image.path().is_absolute());
        assert!(image.path().ends_with("relative/disk.vhdx"));
        Ok(())
    }

    #[test]
    fn capture_source_uses_backslash_archive_root() {
        let source = CaptureSource::for_child(Path::new("/mnt/x123"), "App");
        assert_eq!(source.local_path, PathBuf::from("/mnt/x123/App"));
        assert_eq!(source.archive_path, "\\App");
    }

    #[test]
    fn archive_file_name_appends_extension() {
        assert_eq!(archive_file_name("win10"), "win10.wim");
    }
}
