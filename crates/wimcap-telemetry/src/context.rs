//! Process-wide and per-run tracing spans.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Keeps the `app` span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the application span tagged with the running subcommand.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "app",
            command = %command,
            build_sha = %build_sha()
        )));
        Self {
            _guard: span.enter(),
        }
    }
}

/// Span covering one capture run.
#[must_use]
pub fn capture_span(run_id: &str, image: &str) -> Span {
    tracing::info_span!("capture", run_id = %run_id, image = %image)
}
