//! Error taxonomy for one device backup attempt.
//!
//! Every failure inside an attempt is mapped into a `BackupError` so the retry
//! loop can decide what to do without inspecting strings.

use std::time::Duration;

/// Failure of one step of a device backup (or of the run bootstrap).
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Device unreachable, handshake failed, or authentication rejected.
    #[error("connection to {address} failed: {reason}")]
    Connection { address: String, reason: String },

    /// Expected prompt never appeared during negotiation.
    #[error("protocol error after `{command}`: expected prompt `{expected}`")]
    Protocol { command: String, expected: String },

    /// Command did not finish within its read timeout.
    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// Writing the snapshot (or a transcript) to disk failed.
    #[error("file I/O on {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A git stage/commit/push step failed.
    #[error("git {step} failed (exit {code:?}): {stderr}")]
    GitOperation {
        step: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    /// Initial clone of the backup repository failed. Fatal for the run.
    #[error("cloning {url} failed: {reason}")]
    Clone { url: String, reason: String },

    /// Platform has no capability profile.
    #[error("no profile for platform `{0}`")]
    Configuration(String),
}

impl BackupError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// A missing platform profile is static for the run, so retrying it only
    /// burns attempts; everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BackupError::Configuration(_) | BackupError::Clone { .. })
    }

    pub(crate) fn file_io(path: &std::path::Path, source: std::io::Error) -> Self {
        BackupError::FileIo {
            path: path.display().to_string(),
            source,
        }
    }
}
