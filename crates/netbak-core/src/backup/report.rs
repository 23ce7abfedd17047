//! Run report: one terminal result per device.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::git::CommitOutcome;
use crate::inventory::DeviceDescriptor;
use crate::retry::{AttemptRecord, AttemptStatus};

/// Terminal result of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceResult {
    /// Config fetched and written. `commit` tells whether git caught up with it.
    Success {
        commit: CommitOutcome,
        /// `None` when push was skipped by policy.
        pushed: Option<bool>,
        path: PathBuf,
        sha256: String,
    },
    PermanentFailure { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    #[serde(serialize_with = "device_without_secrets")]
    pub device: DeviceDescriptor,
    pub attempts: u32,
    pub result: DeviceResult,
    pub history: Vec<AttemptRecord>,
}

impl DeviceReport {
    /// Report for a device whose task ended without producing a result.
    pub(super) fn lost(device: DeviceDescriptor) -> Self {
        let reason = "device task ended without a result".to_string();
        Self {
            device,
            attempts: 0,
            result: DeviceResult::PermanentFailure {
                reason: reason.clone(),
            },
            history: vec![AttemptRecord {
                attempt: 0,
                status: AttemptStatus::PermanentFailure(reason),
            }],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, DeviceResult::Success { .. })
    }

    pub fn commit_outcome(&self) -> Option<CommitOutcome> {
        match self.result {
            DeviceResult::Success { commit, .. } => Some(commit),
            DeviceResult::PermanentFailure { .. } => None,
        }
    }
}

fn device_without_secrets<S: Serializer>(d: &DeviceDescriptor, s: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Public<'a> {
        address: &'a str,
        platform: &'a str,
        role: &'a str,
    }
    Public {
        address: &d.address,
        platform: d.platform.as_str(),
        role: &d.role,
    }
    .serialize(s)
}

/// Results of a whole run, keyed by device.
#[derive(Debug, Default)]
pub struct BackupReport {
    devices: HashMap<DeviceDescriptor, DeviceReport>,
}

impl BackupReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn insert(&mut self, report: DeviceReport) {
        self.devices.insert(report.device.clone(), report);
    }

    pub fn get(&self, device: &DeviceDescriptor) -> Option<&DeviceReport> {
        self.devices.get(device)
    }

    pub fn contains(&self, device: &DeviceDescriptor) -> bool {
        self.devices.contains_key(device)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Reports ordered by platform, role, address.
    pub fn entries(&self) -> Vec<&DeviceReport> {
        let mut v: Vec<_> = self.devices.values().collect();
        v.sort_by(|a, b| a.device.stem().cmp(&b.device.stem()));
        v
    }

    pub fn succeeded(&self) -> usize {
        self.devices.values().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Devices whose fetch succeeded with the given commit outcome.
    pub fn count_commit(&self, outcome: CommitOutcome) -> usize {
        self.devices
            .values()
            .filter(|r| r.commit_outcome() == Some(outcome))
            .count()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(addr: &str, commit: CommitOutcome) -> DeviceReport {
        DeviceReport {
            device: DeviceDescriptor::new(addr, "admin", "s3cret", "huawei", "core"),
            attempts: 1,
            result: DeviceResult::Success {
                commit,
                pushed: Some(true),
                path: PathBuf::from(format!("/repo/huawei-core-{addr}-config.txt")),
                sha256: "00".into(),
            },
            history: vec![AttemptRecord {
                attempt: 1,
                status: AttemptStatus::Success,
            }],
        }
    }

    #[test]
    fn counts_by_outcome() {
        let mut r = BackupReport::new();
        r.insert(success("10.0.0.1", CommitOutcome::Committed));
        r.insert(success("10.0.0.2", CommitOutcome::Failed));
        r.insert(DeviceReport::lost(DeviceDescriptor::new(
            "10.0.0.3", "a", "b", "huawei", "core",
        )));
        assert_eq!(r.len(), 3);
        assert_eq!(r.succeeded(), 2);
        assert_eq!(r.failed(), 1);
        assert_eq!(r.count_commit(CommitOutcome::Committed), 1);
        assert_eq!(r.count_commit(CommitOutcome::Failed), 1);
        assert_eq!(r.entries()[0].device.address, "10.0.0.1");
    }

    #[test]
    fn json_never_contains_password() {
        let mut r = BackupReport::new();
        r.insert(success("10.0.0.1", CommitOutcome::NoChange));
        let json = r.to_json_pretty().unwrap();
        assert!(!json.contains("s3cret"));
        assert!(json.contains("\"address\": \"10.0.0.1\""));
        assert!(json.contains("\"commit\": \"no_change\""));
    }
}
