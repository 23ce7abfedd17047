use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::BackupError;

/// Delay strategy between attempts on the same device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Retry immediately (fast fleet scan).
    #[default]
    None,
    /// Wait `base_delay` between attempts.
    Fixed,
    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    Exponential,
}

/// Result of one attempt, as seen by the retry loop.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// Failed, but another attempt is allowed.
    TransientFailure(BackupError),
    /// Failed and no further attempt will be made.
    PermanentFailure(BackupError),
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Bounded retry policy for one device.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Base delay for `Fixed`/`Exponential`.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Backoff::None,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Decide whether to retry after `attempt` (1-based) failed with `err`.
    pub fn decide(&self, attempt: u32, err: &BackupError) -> RetryDecision {
        if attempt >= self.max_attempts.max(1) || !err.is_retryable() {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_after(attempt))
    }

    /// Classify the result of `attempt`.
    pub fn classify<T>(&self, attempt: u32, result: Result<T, BackupError>) -> AttemptOutcome<T> {
        match result {
            Ok(v) => AttemptOutcome::Success(v),
            Err(e) => match self.decide(attempt, &e) {
                RetryDecision::NoRetry => AttemptOutcome::PermanentFailure(e),
                RetryDecision::RetryAfter(_) => AttemptOutcome::TransientFailure(e),
            },
        }
    }

    /// Delay before the attempt following `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed => self.base_delay.min(self.max_delay),
            Backoff::Exponential => {
                let exp = 1u32 << attempt.saturating_sub(1).min(16);
                self.base_delay.saturating_mul(exp).min(self.max_delay)
            }
        }
    }
}
