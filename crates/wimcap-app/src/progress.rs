//! Host-facing progress reporting.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::pipeline::PipelineState;

/// Receives human-readable progress at each major pipeline step.
pub trait ProgressSink: Send + Sync {
    /// One progress line.
    fn message(&self, message: &str);

    /// State transition; ignored by default.
    fn state(&self, _state: PipelineState) {}
}

/// Forwards progress to `tracing` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn message(&self, message: &str) {
        info!(target: "wimcap::progress", "{message}");
    }
}

/// Writes progress lines to stderr, prefixed like the host UI does.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn message(&self, message: &str) {
        eprintln!("==> wimcap: {message}");
    }
}

/// Keeps every message and state in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
    states: Mutex<Vec<PipelineState>>,
}

impl RecordingSink {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// States entered so far.
    #[must_use]
    pub fn states(&self) -> Vec<PipelineState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for RecordingSink {
    fn message(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn state(&self, state: PipelineState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(state);
    }
}
