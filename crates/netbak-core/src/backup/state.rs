//! Per-device task states, for logging.

use std::fmt;

use crate::inventory::DeviceDescriptor;

/// Where a device task is. Any failure moves to `RetryPending` (or `Failed`
/// once attempts are exhausted); `RetryPending` loops back to `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Pending,
    Connecting,
    Negotiating,
    Fetching,
    Writing,
    Committing,
    RetryPending,
    Done,
    Failed,
}

impl DeviceState {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceState::Pending => "PENDING",
            DeviceState::Connecting => "CONNECTING",
            DeviceState::Negotiating => "NEGOTIATING",
            DeviceState::Fetching => "FETCHING",
            DeviceState::Writing => "WRITING",
            DeviceState::Committing => "COMMITTING",
            DeviceState::RetryPending => "RETRY_PENDING",
            DeviceState::Done => "DONE",
            DeviceState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeviceState::Done | DeviceState::Failed)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(super) fn enter(device: &DeviceDescriptor, attempt: u32, state: DeviceState) {
    tracing::debug!(device = %device.address, attempt, state = %state, "device state");
}
