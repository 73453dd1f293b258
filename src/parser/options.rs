//! Parse options

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Options for a [`Parser`](super::Parser)
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Stop early when this token is cancelled
    pub cancellation: Option<CancellationToken>,
    /// Stop early once a parse has run this long
    pub timeout: Option<Duration>,
    /// Parser steps between cancellation and timeout checks
    pub cancellation_check_interval: u32,
    /// Deepest stack pop error recovery will consider
    pub max_pop_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            cancellation: None,
            timeout: None,
            cancellation_check_interval: 100,
            max_pop_depth: 8,
        }
    }
}

impl ParseOptions {
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_check_interval(mut self, steps: u32) -> Self {
        self.cancellation_check_interval = steps.max(1);
        self
    }

    pub fn with_max_pop_depth(mut self, depth: usize) -> Self {
        self.max_pop_depth = depth;
        self
    }

    /// Whether any stop condition is configured
    pub(crate) fn can_stop(&self) -> bool {
        self.cancellation.is_some() || self.timeout.is_some()
    }
}
