//! Retry and backoff policy for device backup attempts.
//!
//! One attempt is the whole connect → fetch → write → commit sequence for a
//! single device. The policy turns each attempt's result into an explicit
//! `AttemptOutcome`; the loop acts on that outcome only.

mod policy;
mod run;

pub use policy::{AttemptOutcome, Backoff, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, AttemptRecord, AttemptStatus, RetryRun};
