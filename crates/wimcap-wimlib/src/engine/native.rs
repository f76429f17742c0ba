use std::ffi::{OsStr, c_int};
use std::path::Path;
use std::ptr::{self, NonNull};

use tracing::debug;
use wimcap_core::{CaptureSource, CompressionMode};

use super::{ImageHandle, WimEngine};
use crate::error::{EnginePhase, WimlibError, WimlibResult};
use crate::ffi::{self, TString, WIMStruct, wimlib_capture_source};

const WRITE_FLAGS: c_int = 0;
const WRITER_THREADS: u32 = 1;

/// Engine backed by the system `libwim`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl WimEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "wimlib"
    }

    fn create_image(&self, compression: CompressionMode) -> WimlibResult<Box<dyn ImageHandle>> {
        let mut raw: *mut WIMStruct = ptr::null_mut();
        #[allow(clippy::cast_possible_wrap)]
        let ctype = compression.engine_code() as c_int;
        // SAFETY: `raw` is a valid out-pointer; wimlib writes it only on success.
        let status = unsafe { ffi::wimlib_create_new_wim(ctype, &raw mut raw) };
        check(EnginePhase::Create, status)?;
        let wim = NonNull::new(raw).ok_or_else(|| WimlibError::Engine {
            phase: EnginePhase::Create,
            status,
            message: "wimlib returned a null handle".to_string(),
        })?;
        debug!(codec = compression.codec_name(), "wimlib handle created");
        Ok(Box::new(NativeImage { wim }))
    }
}

/// Owned `WIMStruct`. `NonNull` keeps the type `!Send`.
struct NativeImage {
    wim: NonNull<WIMStruct>,
}

impl ImageHandle for NativeImage {
    fn add_sources(&mut self, sources: &[CaptureSource], image_name: &str) -> WimlibResult<()> {
        let name = encode(EnginePhase::Add, OsStr::new(image_name))?;

        if sources.is_empty() {
            // SAFETY: `wim` is live; `name` outlives the call; NULL index out-pointer is allowed.
            let status = unsafe {
                ffi::wimlib_add_empty_image(self.wim.as_ptr(), name.as_ptr(), ptr::null_mut())
            };
            return check(EnginePhase::Add, status);
        }

        let arena = SourceArena::new(sources)?;
        // SAFETY: `arena` owns every string referenced by its entries and
        // outlives the call; the config file may be NULL.
        let status = unsafe {
            ffi::wimlib_add_image_multisource(
                self.wim.as_ptr(),
                arena.entries.as_ptr(),
                arena.entries.len(),
                name.as_ptr(),
                ptr::null(),
                ffi::CAPTURE_ADD_FLAGS,
            )
        };
        drop(arena);
        check(EnginePhase::Add, status)
    }

    fn write(&mut self, output_path: &Path) -> WimlibResult<()> {
        let path = encode(EnginePhase::Write, output_path.as_os_str())?;
        // SAFETY: `wim` is live and `path` outlives the call.
        let status = unsafe {
            ffi::wimlib_write(
                self.wim.as_ptr(),
                path.as_ptr(),
                ffi::WIMLIB_ALL_IMAGES,
                WRITE_FLAGS,
                WRITER_THREADS,
            )
        };
        check(EnginePhase::Write, status)
    }
}

impl Drop for NativeImage {
    fn drop(&mut self) {
        // SAFETY: `wim` came from wimlib_create_new_wim and is freed exactly once here.
        unsafe {
            ffi::wimlib_free(self.wim.as_ptr());
            ffi::wimlib_global_cleanup();
        }
        debug!("wimlib handle released");
    }
}

/// Owns the encoded paths and the struct array passed to one
/// `wimlib_add_image_multisource` call.
struct SourceArena {
    _strings: Vec<TString>,
    entries: Vec<wimlib_capture_source>,
}

impl SourceArena {
    fn new(sources: &[CaptureSource]) -> WimlibResult<Self> {
        let mut strings = Vec::with_capacity(sources.len() * 2);
        for source in sources {
            strings.push(encode(EnginePhase::Add, source.local_path.as_os_str())?);
            strings.push(encode(EnginePhase::Add, OsStr::new(&source.archive_path))?);
        }
        // Buffers live on the heap, so pointers survive moving `strings`.
        let entries = strings
            .chunks_exact_mut(2)
            .map(|pair| wimlib_capture_source {
                fs_source_path: pair[0].as_mut_ptr(),
                wim_target_path: pair[1].as_mut_ptr(),
                reserved: 0,
            })
            .collect();
        Ok(Self {
            _strings: strings,
            entries,
        })
    }
}

fn encode(phase: EnginePhase, value: &OsStr) -> WimlibResult<TString> {
    TString::new(value).ok_or_else(|| WimlibError::InvalidArgument {
        phase,
        value: value.into(),
        reason: "interior_nul",
    })
}

fn check(phase: EnginePhase, status: c_int) -> WimlibResult<()> {
    if status == 0 {
        Ok(())
    } else {
        Err(WimlibError::Engine {
            phase,
            status,
            message: ffi::error_string(status),
        })
    }
}
