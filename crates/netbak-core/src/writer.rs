//! Snapshot files inside the backup working copy.
//!
//! Each device has exactly one file, `{platform}-{role}-{address}-config.txt`,
//! fully replaced on every successful fetch. The text is written to a `.part`
//! file first and renamed over the target, so a failed write never leaves
//! a truncated snapshot behind for git to pick up. In a git working copy the
//! `.part` file lives under `.git/`, outside the tree git reports on.

use std::path::{Path, PathBuf};

use crate::error::BackupError;
use crate::inventory::DeviceDescriptor;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Snapshot file name for `device`. Depends only on platform, role and address.
pub fn config_filename(device: &DeviceDescriptor) -> String {
    format!("{}-config.txt", device.stem())
}

/// Path for the temp file: appends `.part` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Writes fetched configs into one repository directory.
#[derive(Debug, Clone)]
pub struct ConfigWriter {
    repo_dir: PathBuf,
}

impl ConfigWriter {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Destination path of `device`'s snapshot.
    pub fn path_for(&self, device: &DeviceDescriptor) -> PathBuf {
        self.repo_dir.join(config_filename(device))
    }

    /// Where `device`'s snapshot is staged before the rename: inside `.git/`
    /// for a working copy, next to the target otherwise.
    pub fn temp_path_for(&self, device: &DeviceDescriptor) -> PathBuf {
        let git_dir = self.repo_dir.join(".git");
        if git_dir.is_dir() {
            temp_path(&git_dir.join(config_filename(device)))
        } else {
            temp_path(&self.path_for(device))
        }
    }

    /// Replace `device`'s snapshot with `text`. Returns the final path.
    pub async fn write(&self, device: &DeviceDescriptor, text: &str) -> Result<PathBuf, BackupError> {
        let final_path = self.path_for(device);
        let part = self.temp_path_for(device);
        tokio::fs::write(&part, text)
            .await
            .map_err(|e| BackupError::file_io(&part, e))?;
        if let Err(e) = tokio::fs::rename(&part, &final_path).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(BackupError::file_io(&final_path, e));
        }
        tracing::info!(address = %device.address, path = %final_path.display(), "config saved");
        Ok(final_path)
    }
}
