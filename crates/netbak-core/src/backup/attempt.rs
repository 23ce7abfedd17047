//! One backup attempt for one device.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::state::{enter, DeviceState};
use crate::checksum;
use crate::driver::SessionDriver;
use crate::error::BackupError;
use crate::git::{CommitReceipt, GitCommitPipeline};
use crate::inventory::DeviceDescriptor;
use crate::platform::{self, PlatformProfile};
use crate::writer::{self, ConfigWriter};

/// Everything an attempt needs; shared by all device tasks of a run.
#[derive(Clone)]
pub(super) struct AttemptContext {
    pub driver: Arc<dyn SessionDriver>,
    pub writer: ConfigWriter,
    pub pipeline: Arc<GitCommitPipeline>,
    pub fetch_timeout: Option<Duration>,
}

/// A fetch + write that went through; the commit may still have failed.
#[derive(Debug)]
pub(super) struct AttemptSuccess {
    pub receipt: CommitReceipt,
    pub path: PathBuf,
    pub sha256: String,
}

impl AttemptContext {
    fn profile(&self, device: &DeviceDescriptor) -> Result<PlatformProfile, BackupError> {
        let profile = platform::profile_for(&device.platform)?;
        Ok(match self.fetch_timeout {
            Some(t) => profile.with_fetch_timeout(t),
            None => profile.clone(),
        })
    }

    pub async fn run(
        &self,
        device: &DeviceDescriptor,
        attempt: u32,
    ) -> Result<AttemptSuccess, BackupError> {
        let profile = self.profile(device)?;

        enter(device, attempt, DeviceState::Connecting);
        let text = {
            let driver = Arc::clone(&self.driver);
            let device = device.clone();
            let address = device.address.clone();
            tokio::task::spawn_blocking(move || fetch(driver.as_ref(), &device, &profile, attempt))
                .await
                .map_err(|e| BackupError::Connection {
                    address,
                    reason: format!("session task: {e}"),
                })??
        };

        enter(device, attempt, DeviceState::Writing);
        let path = self.writer.write(device, &text).await?;

        enter(device, attempt, DeviceState::Committing);
        let receipt = self
            .pipeline
            .commit_file(&writer::config_filename(device))
            .await;

        Ok(AttemptSuccess {
            receipt,
            path,
            sha256: checksum::sha256_hex(text.as_bytes()),
        })
    }
}

/// Blocking session part: connect, negotiate, dump config. The session is
/// closed when it goes out of scope.
fn fetch(
    driver: &dyn SessionDriver,
    device: &DeviceDescriptor,
    profile: &PlatformProfile,
    attempt: u32,
) -> Result<String, BackupError> {
    let mut session = driver.connect(device)?;
    enter(device, attempt, DeviceState::Negotiating);
    session.negotiate(profile)?;
    enter(device, attempt, DeviceState::Fetching);
    session.fetch_config(profile)
}
