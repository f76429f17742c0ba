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

//! Binary entrypoint: parses the command line and runs one capture or
//! cleanup.

use wimcap_app::{AppResult, run_cli};

/// Runs the selected command and exits non-zero on failure.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_cli().await
}
