//! Execution context — the cancellation and deadline signal threaded
//! through every completion call and tool invocation.
//!
//! The loop has exactly two suspension points (the completion call and the
//! tool handler); both receive this context so in-flight work can be
//! abandoned cooperatively when the caller cancels or the deadline fires.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline signal for one loop execution.
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Fires when the caller cancels the run.
    pub cancellation: CancellationToken,

    /// Absolute point after which no further work may start.
    pub deadline: Option<Instant>,
}

impl ExecContext {
    /// A context with no deadline and a fresh token.
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Replace the cancellation token (e.g. with a caller-supplied one).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Whether the run has been cancelled or the deadline has passed.
    pub fn is_interrupted(&self) -> bool {
        self.cancellation.is_cancelled()
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time remaining until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}
