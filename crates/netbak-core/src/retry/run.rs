//! Retry loop: run an attempt until success or the policy says stop.

use serde::Serialize;
use std::future::Future;

use super::policy::{AttemptOutcome, RetryPolicy};
use crate::error::BackupError;

/// What happened on one attempt (reason strings for the report).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    TransientFailure(String),
    PermanentFailure(String),
}

/// One entry of a device's attempt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    #[serde(flatten)]
    pub status: AttemptStatus,
}

/// Final result of a retried operation.
#[derive(Debug)]
pub struct RetryRun<T> {
    /// Attempts actually made.
    pub attempts: u32,
    pub history: Vec<AttemptRecord>,
    pub result: Result<T, BackupError>,
}

/// Runs `attempt_fn` (given the 1-based attempt number) until it succeeds or
/// the policy classifies a failure as permanent. Attempts are strictly
/// sequential. Between attempts, sleeps for the policy's backoff delay.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, device: &str, mut attempt_fn: F) -> RetryRun<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, BackupError>>,
{
    let max = policy.max_attempts.max(1);
    let mut history = Vec::new();
    let mut attempt = 1u32;
    loop {
        match policy.classify(attempt, attempt_fn(attempt).await) {
            AttemptOutcome::Success(value) => {
                history.push(AttemptRecord {
                    attempt,
                    status: AttemptStatus::Success,
                });
                return RetryRun {
                    attempts: attempt,
                    history,
                    result: Ok(value),
                };
            }
            AttemptOutcome::PermanentFailure(err) => {
                tracing::error!(device, attempt, max, error = %err, "backup failed, giving up");
                history.push(AttemptRecord {
                    attempt,
                    status: AttemptStatus::PermanentFailure(err.to_string()),
                });
                return RetryRun {
                    attempts: attempt,
                    history,
                    result: Err(err),
                };
            }
            AttemptOutcome::TransientFailure(err) => {
                tracing::warn!(device, attempt, max, error = %err, "backup attempt failed, retrying");
                history.push(AttemptRecord {
                    attempt,
                    status: AttemptStatus::TransientFailure(err.to_string()),
                });
                let delay = policy.delay_after(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
