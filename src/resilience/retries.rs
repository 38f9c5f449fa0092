//! Retry logic.
//!
//! # Responsibilities
//! - Bound the number of re-dispatches per request
//!
//! # Design Decisions
//! - Retries happen immediately against a different (alive) backend; the
//!   failed one has already been marked dead, so no backoff is needed
//! - The retry count is an explicit loop variable owned by the request

use crate::config::RetryConfig;

/// How many times a failed request may be re-dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total forwarding attempts a single request may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another retry is allowed after `retries` have been made.
    pub fn should_retry(&self, retries: u32) -> bool {
        retries < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries)
    }
}
