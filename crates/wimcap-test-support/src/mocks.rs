//! Recording fakes for the mount service and the archive engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use wimcap_core::{CaptureSource, CompressionMode, DiskImageRef};
use wimcap_fsops::{FsOpsError, FsOpsResult, MountService, MountSession, ensure_empty_dir};
use wimcap_wimlib::{
    EnginePhase, ImageHandle, StubEngine, WimEngine, WimlibError, WimlibResult,
};

use crate::fixtures::copy_tree;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mount service fake that "mounts" by copying a fixture tree.
///
/// Cloning shares the call log, so a clone handed to the code under test can
/// be inspected afterwards.
#[derive(Clone, Default)]
pub struct RecordingMountService {
    fixture: Option<PathBuf>,
    mount_failure: Option<String>,
    unmount_failure: Option<String>,
    vanishing: bool,
    log: Arc<Mutex<Vec<MountCall>>>,
}

/// One call observed by [`RecordingMountService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    /// `mount(image, mount_point)`.
    Mount {
        /// Image path.
        image: PathBuf,
        /// Target directory.
        mount_point: PathBuf,
    },
    /// `unmount(session, discard_changes)`.
    Unmount {
        /// Released directory.
        mount_point: PathBuf,
        /// Discard flag supplied by the caller.
        discard_changes: bool,
    },
}

impl RecordingMountService {
    /// Service exposing an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a copy of `fixture` at every mount point.
    #[must_use]
    pub fn with_fixture(mut self, fixture: impl Into<PathBuf>) -> Self {
        self.fixture = Some(fixture.into());
        self
    }

    /// Make every mount fail with `diagnostic`.
    #[must_use]
    pub fn failing_mount(mut self, diagnostic: impl Into<String>) -> Self {
        self.mount_failure = Some(diagnostic.into());
        self
    }

    /// Make every unmount fail with `diagnostic`, leaving the tree in place.
    #[must_use]
    pub fn failing_unmount(mut self, diagnostic: impl Into<String>) -> Self {
        self.unmount_failure = Some(diagnostic.into());
        self
    }

    /// Remove the mount point right after a successful mount, so listing the
    /// mounted root fails. Unmount then finds nothing to release.
    #[must_use]
    pub fn vanishing_mount(mut self) -> Self {
        self.vanishing = true;
        self
    }

    /// Every call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MountCall> {
        lock(&self.log).clone()
    }

    /// Number of mount attempts.
    #[must_use]
    pub fn mount_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, MountCall::Mount { .. }))
            .count()
    }

    /// Number of unmount attempts.
    #[must_use]
    pub fn unmount_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, MountCall::Unmount { .. }))
            .count()
    }

    fn tool_failure(operation: &'static str, diagnostic: &str) -> FsOpsError {
        FsOpsError::ToolFailed {
            operation,
            program: "recording-mount".to_string(),
            status: Some(1),
            diagnostic: diagnostic.to_string(),
        }
    }
}

#[async_trait]
impl MountService for RecordingMountService {
    async fn mount(&self, image: &DiskImageRef, mount_point: &Path) -> FsOpsResult<MountSession> {
        lock(&self.log).push(MountCall::Mount {
            image: image.path().to_path_buf(),
            mount_point: mount_point.to_path_buf(),
        });
        if let Some(diagnostic) = &self.mount_failure {
            return Err(Self::tool_failure("mount.recording", diagnostic));
        }
        ensure_empty_dir(mount_point)?;
        if let Some(fixture) = &self.fixture {
            copy_tree(fixture, mount_point).map_err(|err| {
                Self::tool_failure("mount.recording", &format!("fixture copy failed: {err:#}"))
            })?;
        }
        if self.vanishing {
            fs::remove_dir_all(mount_point).map_err(|source| FsOpsError::Io {
                operation: "mount.recording",
                path: mount_point.to_path_buf(),
                source,
            })?;
        }
        Ok(MountSession::new(image.clone(), mount_point.to_path_buf()))
    }

    async fn unmount(&self, session: MountSession, discard_changes: bool) -> FsOpsResult<()> {
        lock(&self.log).push(MountCall::Unmount {
            mount_point: session.mount_point().to_path_buf(),
            discard_changes,
        });
        if let Some(diagnostic) = &self.unmount_failure {
            return Err(Self::tool_failure("unmount.recording", diagnostic));
        }
        if self.vanishing && !session.mount_point().exists() {
            return Ok(());
        }
        let entries = fs::read_dir(session.mount_point()).map_err(|source| FsOpsError::Io {
            operation: "unmount.recording",
            path: session.mount_point().to_path_buf(),
            source,
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|source| FsOpsError::Io {
                operation: "unmount.recording",
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Blocks a scripted capture until released, so tests can cancel while the
/// capture is in flight.
#[derive(Clone, Default)]
pub struct CaptureGate {
    state: Arc<(Mutex<GateState>, Condvar)>,
}

#[derive(Default)]
struct GateState {
    entered: bool,
    released: bool,
}

impl CaptureGate {
    /// Closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the held capture continue.
    pub fn release(&self) {
        let (mutex, condvar) = &*self.state;
        lock(mutex).released = true;
        condvar.notify_all();
    }

    /// Wait until a capture reaches the gate; `false` on timeout.
    #[must_use]
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        let (mutex, condvar) = &*self.state;
        let guard = lock(mutex);
        let (guard, _) = condvar
            .wait_timeout_while(guard, timeout, |state| !state.entered)
            .unwrap_or_else(PoisonError::into_inner);
        guard.entered
    }

    fn pass(&self) {
        let (mutex, condvar) = &*self.state;
        let mut guard = lock(mutex);
        guard.entered = true;
        condvar.notify_all();
        let _guard = condvar
            .wait_while(guard, |state| !state.released)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Engine fake wrapping [`StubEngine`] with per-phase failure injection.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    failure: Option<(EnginePhase, i32)>,
    gate: Option<CaptureGate>,
    counters: Arc<EngineCounters>,
    compressions: Arc<Mutex<Vec<CompressionMode>>>,
    sources: Arc<Mutex<Vec<Vec<CaptureSource>>>>,
}

#[derive(Default)]
struct EngineCounters {
    created: AtomicUsize,
    released: AtomicUsize,
    writes: AtomicUsize,
}

impl ScriptedEngine {
    /// Engine that succeeds at every phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `phase` with engine status `status`.
    #[must_use]
    pub fn failing(mut self, phase: EnginePhase, status: i32) -> Self {
        self.failure = Some((phase, status));
        self
    }

    /// Hold every capture at the add phase until `gate` is released.
    #[must_use]
    pub fn gated(mut self, gate: CaptureGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Handles created so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    /// Handles dropped so far.
    #[must_use]
    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Successful writes so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.counters.writes.load(Ordering::SeqCst)
    }

    /// Compression of every created handle.
    #[must_use]
    pub fn compressions(&self) -> Vec<CompressionMode> {
        lock(&self.compressions).clone()
    }

    /// Sources passed to every add call.
    #[must_use]
    pub fn added_sources(&self) -> Vec<Vec<CaptureSource>> {
        lock(&self.sources).clone()
    }

    fn scripted(&self, phase: EnginePhase) -> WimlibResult<()> {
        match self.failure {
            Some((failing, status)) if failing == phase => Err(WimlibError::Engine {
                phase,
                status,
                message: format!("scripted {phase} failure"),
            }),
            _ => Ok(()),
        }
    }
}

impl WimEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn create_image(&self, compression: CompressionMode) -> WimlibResult<Box<dyn ImageHandle>> {
        lock(&self.compressions).push(compression);
        self.scripted(EnginePhase::Create)?;
        let inner = StubEngine.create_image(compression)?;
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedHandle {
            engine: self.clone(),
            inner,
        }))
    }
}

struct ScriptedHandle {
    engine: ScriptedEngine,
    inner: Box<dyn ImageHandle>,
}

impl ImageHandle for ScriptedHandle {
    fn add_sources(&mut self, sources: &[CaptureSource], image_name: &str) -> WimlibResult<()> {
        lock(&self.engine.sources).push(sources.to_vec());
        if let Some(gate) = &self.engine.gate {
            gate.pass();
        }
        self.engine.scripted(EnginePhase::Add)?;
        self.inner.add_sources(sources, image_name)
    }

    fn write(&mut self, output_path: &Path) -> WimlibResult<()> {
        self.engine.scripted(EnginePhase::Write)?;
        self.inner.write(output_path)?;
        self.engine.counters.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.engine.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use wimcap_core::CaptureRequest;
    use wimcap_wimlib::ArchiveWriter;

    use super::*;
    use crate::fixtures::build_mount_tree;

    #[tokio::test]
    async fn recording_mount_copies_fixture_and_clears_on_unmount() -> anyhow::Result<()> {
        let fixture = TempDir::new()?;
        build_mount_tree(fixture.path(), &[("App/a.txt", "a")])?;
        let mount_point = TempDir::new()?;
        let service = RecordingMountService::new().with_fixture(fixture.path());

        let image = DiskImageRef::new("/img/disk.vhdx")?;
        let session = service.mount(&image, mount_point.path()).await?;
        assert!(mount_point.path().join("App/a.txt").is_file());
        service.unmount(session, true).await?;
        assert!(fs::read_dir(mount_point.path())?.next().is_none());
        assert_eq!(service.mount_count(), 1);
        assert_eq!(service.unmount_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failing_mount_is_recorded() -> anyhow::Result<()> {
        let mount_point = TempDir::new()?;
        let service = RecordingMountService::new().failing_mount("access denied");
        let image = DiskImageRef::new("/img/disk.vhdx")?;
        let err = service
            .mount(&image, mount_point.path())
            .await
            .expect_err("scripted failure");
        assert!(err.detail().contains("access denied"));
        assert_eq!(service.mount_count(), 1);
        Ok(())
    }

    #[test]
    fn scripted_write_failure_still_releases_handle() -> anyhow::Result<()> {
        let out = TempDir::new()?;
        let engine = ScriptedEngine::new().failing(EnginePhase::Write, 42);
        let writer = ArchiveWriter::new(Arc::new(engine.clone()));
        let request = CaptureRequest::new(
            "x",
            CompressionMode::Fast,
            Vec::new(),
            out.path().join("x.wim"),
        );

        let err = writer.capture(&request).expect_err("scripted");
        assert_eq!(err.status(), Some(42));
        assert_eq!(engine.created(), 1);
        assert_eq!(engine.released(), 1);
        assert_eq!(engine.writes(), 0);
        assert_eq!(engine.compressions(), vec![CompressionMode::Fast]);
        Ok(())
    }

    #[test]
    fn gate_holds_capture_until_released() -> anyhow::Result<()> {
        let out = TempDir::new()?;
        let gate = CaptureGate::new();
        let engine = ScriptedEngine::new().gated(gate.clone());
        let writer = ArchiveWriter::new(Arc::new(engine.clone()));
        let request =
            CaptureRequest::new("x", CompressionMode::None, Vec::new(), out.path().join("x.wim"));

        let worker = std::thread::spawn(move || writer.capture(&request));
        assert!(gate.wait_entered(Duration::from_secs(5)));
        assert_eq!(engine.writes(), 0);
        gate.release();
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker panicked"))??;
        assert_eq!(engine.writes(), 1);
        Ok(())
    }
}
