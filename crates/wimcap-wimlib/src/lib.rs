#![deny(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Archive engine adapter: raw `wimlib` bindings, a native engine, a
//! manifest-writing stub, and the writer that drives one capture.

/// Engine trait plus native and stub implementations.
pub mod engine;
pub mod error;
#[cfg(feature = "wimlib")]
#[allow(unsafe_code)]
pub mod ffi;
pub mod worker;
pub mod writer;

#[cfg(feature = "wimlib")]
pub use engine::NativeEngine;
pub use engine::{
    ImageHandle, STUB_FORMAT, StubEngine, StubEntry, StubImage, StubManifest, StubSource,
    WimEngine, default_engine,
};
pub use error::{EnginePhase, WimlibError, WimlibResult};
pub use worker::spawn_capture;
pub use writer::ArchiveWriter;
