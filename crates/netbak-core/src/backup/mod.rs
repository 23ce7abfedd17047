//! Backup orchestration.
//!
//! Fans out one task per device. Each task holds a session slot from the
//! `ConcurrencyLimiter` for its whole retry loop and runs attempts of
//! connect → negotiate → fetch → write → commit until one succeeds or the
//! `RetryPolicy` gives up. Results are collected into a `BackupReport`.

mod attempt;
mod report;
mod run;
mod state;

pub use report::{BackupReport, DeviceReport, DeviceResult};
pub use run::{run_backup, Orchestrator};
pub use state::DeviceState;
