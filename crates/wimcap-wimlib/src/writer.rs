//! Capture request execution against an engine.

use std::sync::Arc;

use tracing::{debug, info};
use wimcap_core::CaptureRequest;

use crate::engine::WimEngine;
use crate::error::WimlibResult;

/// Runs create, add and write for one request on the calling thread.
///
/// A fresh engine handle is created per call and released before returning,
/// on success and on every error path.
#[derive(Clone)]
pub struct ArchiveWriter {
    engine: Arc<dyn WimEngine>,
}

impl ArchiveWriter {
    /// Wrap an engine.
    #[must_use]
    pub fn new(engine: Arc<dyn WimEngine>) -> Self {
        Self { engine }
    }

    /// Identifier of the wrapped engine.
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Capture every source of `request` into its output file.
    ///
    /// Blocks for the duration of the native work.
    ///
    /// # Errors
    ///
    /// Returns the first failing phase's [`crate::WimlibError`].
    pub fn capture(&self, request: &CaptureRequest) -> WimlibResult<()> {
        let mut handle = self.engine.create_image(request.compression())?;
        debug!(
            engine = self.engine.name(),
            codec = request.compression().codec_name(),
            "archive handle created"
        );
        handle.add_sources(request.sources(), request.archive_name())?;
        debug!(sources = request.sources().len(), "sources added");
        handle.write(request.output_path())?;
        info!(
            output = %request.output_path().display(),
            image = request.archive_name(),
            "archive written"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("engine", &self.engine.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use wimcap_core::{CaptureSource, CompressionMode};

    use super::*;
    use crate::engine::{StubEngine, StubManifest};
    use crate::error::EnginePhase;

    #[test]
    fn capture_writes_named_image_with_requested_compression() -> anyhow::Result<()> {
        let mount = TempDir::new()?;
        std::fs::create_dir(mount.path().join("App"))?;
        let out = TempDir::new()?;
        let output = out.path().join("win10.wim");
        let request = CaptureRequest::new(
            "win10",
            CompressionMode::Max,
            vec![CaptureSource::for_child(mount.path(), "App")],
            &output,
        );

        let writer = ArchiveWriter::new(Arc::new(StubEngine));
        writer.capture(&request)?;

        let manifest = StubManifest::load(&output)?;
        assert_eq!(manifest.compression, CompressionMode::Max);
        assert_eq!(manifest.images[0].name, "win10");
        assert_eq!(manifest.images[0].sources.len(), 1);
        Ok(())
    }

    #[test]
    fn add_failure_skips_write() -> anyhow::Result<()> {
        let mount = TempDir::new()?;
        let out = TempDir::new()?;
        let output = out.path().join("x.wim");
        let request = CaptureRequest::new(
            "x",
            CompressionMode::Fast,
            vec![CaptureSource::for_child(mount.path(), "Missing")],
            &output,
        );

        let err = ArchiveWriter::new(Arc::new(StubEngine))
            .capture(&request)
            .expect_err("missing source");
        assert_eq!(err.phase(), EnginePhase::Add);
        assert!(!output.exists());
        Ok(())
    }
}
