//! Blocking-pool dispatch for archive captures.
//!
//! The engine offers no abort hook, so a dispatched capture always runs to
//! completion; callers that stop waiting simply drop the join handle.

use tokio::task::JoinHandle;
use wimcap_core::CaptureRequest;

use crate::error::WimlibResult;
use crate::writer::ArchiveWriter;

/// Run `writer.capture(request)` on Tokio's blocking pool.
///
/// The engine handle is created, used and released on the worker thread,
/// inside the caller's current span.
#[must_use]
pub fn spawn_capture(
    writer: ArchiveWriter,
    request: CaptureRequest,
) -> JoinHandle<WimlibResult<()>> {
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(|| writer.capture(&request)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;
    use wimcap_core::CompressionMode;

    use super::*;
    use crate::engine::StubEngine;

    #[tokio::test]
    async fn capture_runs_on_blocking_pool() -> anyhow::Result<()> {
        let out = TempDir::new()?;
        let output = out.path().join("empty.wim");
        let request = CaptureRequest::new("empty", CompressionMode::None, Vec::new(), &output);

        spawn_capture(ArchiveWriter::new(Arc::new(StubEngine)), request).await??;
        assert!(output.is_file());
        Ok(())
    }
}
