#![forbid(unsafe_code)]
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

//! Capture pipeline and `wimcap` binary wiring.
//!
//! Layout: `pipeline.rs` (state machine driving one run), `artifact.rs`
//! (result handed to the host), `progress.rs` (progress sinks), `cli.rs`
//! (argument parsing and settings resolution), `bootstrap.rs` (logging,
//! cancellation and command dispatch).

pub mod artifact;
/// Logging, cancellation and command dispatch.
pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod pipeline;
pub mod progress;

pub use artifact::{ARTIFACT_BUILDER_ID, Artifact};
pub use bootstrap::{run, run_cli};
pub use error::{AppError, AppResult, PipelineError, PipelineFailure};
pub use pipeline::{CapturePipeline, PipelineState};
pub use progress::{ConsoleSink, ProgressSink, RecordingSink, TracingSink};
