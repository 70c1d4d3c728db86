//! Retry policy for waiting on guest processes.

use std::time::Duration;

/// Backoff multiplier applied to the poll interval after a failed poll.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 3;

/// Shortest delay after a failed poll, so a zero poll interval cannot spin.
pub const MIN_BACKOFF: Duration = Duration::from_millis(100);

/// How the process runner reacts to failures while waiting on a guest process.
///
/// The default never gives up; callers that need a bound set
/// `max_consecutive_failures` or pass a cancellation token in
/// [`RunOptions`](crate::RunOptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Multiple of the poll interval slept after a failure (values below 2 are treated as 2).
    pub backoff_multiplier: u32,
    /// Consecutive failures tolerated before giving up; `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    /// Retry forever.
    pub fn unbounded() -> Self {
        Self {
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_consecutive_failures: None,
        }
    }

    /// Give up after `max` consecutive failures.
    pub fn bounded(max: u32) -> Self {
        Self {
            max_consecutive_failures: Some(max),
            ..Self::unbounded()
        }
    }

    /// Delay after a failed attempt; always strictly longer than `interval`
    /// and never below [`MIN_BACKOFF`].
    pub fn backoff(&self, interval: Duration) -> Duration {
        interval
            .saturating_mul(self.backoff_multiplier.max(2))
            .max(interval.saturating_add(MIN_BACKOFF))
    }

    /// Whether `failures` consecutive failures exhaust the policy.
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_consecutive_failures
            .is_some_and(|max| failures >= max)
    }
}
