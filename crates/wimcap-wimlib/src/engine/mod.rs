//! Archive engine abstraction and its native/stub implementations.

use std::path::Path;
use std::sync::Arc;

#[cfg(not(feature = "wimlib"))]
use tracing::warn;
use wimcap_core::{CaptureSource, CompressionMode};

use crate::error::WimlibResult;

#[cfg(feature = "wimlib")]
#[allow(unsafe_code)]
mod native;
mod stub;

#[cfg(feature = "wimlib")]
pub use native::NativeEngine;
pub use stub::{STUB_FORMAT, StubEngine, StubEntry, StubImage, StubManifest, StubSource};

/// One in-memory archive. Released when dropped.
///
/// Handles are confined to the thread that created them.
pub trait ImageHandle {
    /// Capture `sources` as a single image named `image_name`.
    ///
    /// An empty `sources` slice produces an empty image.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::WimlibError`] in the `add` phase.
    fn add_sources(&mut self, sources: &[CaptureSource], image_name: &str) -> WimlibResult<()>;

    /// Serialise every image to `output_path`.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::WimlibError`] in the `write` phase.
    fn write(&mut self, output_path: &Path) -> WimlibResult<()>;
}

/// Factory for archive handles.
pub trait WimEngine: Send + Sync {
    /// Stable engine identifier for logs.
    fn name(&self) -> &'static str;

    /// Allocate an empty archive using `compression`.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::WimlibError`] in the `create` phase.
    fn create_image(&self, compression: CompressionMode) -> WimlibResult<Box<dyn ImageHandle>>;
}

/// Engine selected at build time: native when the `wimlib` feature is on
/// (the default), the manifest-writing stub when it has been turned off.
#[must_use]
pub fn default_engine() -> Arc<dyn WimEngine> {
    #[cfg(feature = "wimlib")]
    {
        Arc::new(NativeEngine)
    }

    #[cfg(not(feature = "wimlib"))]
    {
        warn!(
            format = STUB_FORMAT,
            "built without the `wimlib` feature; archives will be JSON manifests, not WIM files"
        );
        Arc::new(StubEngine)
    }
}
