//! One-time working-copy bootstrap: clone the backup remote unless the
//! target directory already exists.

use std::path::Path;

use super::command::run_git;
use crate::error::BackupError;

/// What the bootstrap did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Cloned,
    /// Directory existed; reused as is.
    Reused,
}

/// Working-copy directory name for `remote`: last path segment without `.git`.
///
/// Accepts URLs (`https://host/group/net-backup.git`) and plain paths.
/// Returns `None` if there is no usable segment.
pub fn repo_dir_name(remote: &str) -> Option<String> {
    let segment = match url::Url::parse(remote) {
        Ok(parsed) => parsed
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .last()?
            .to_string(),
        Err(_) => Path::new(remote).file_name()?.to_str()?.to_string(),
    };
    let name = segment.strip_suffix(".git").unwrap_or(&segment);
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// `remote` with any embedded credentials removed, for logs and errors.
pub fn redact_url(remote: &str) -> String {
    match url::Url::parse(remote) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        _ => remote.to_string(),
    }
}

/// Clone `remote` into `target` if `target` does not exist.
///
/// An existing directory is reused without inspection. A failed clone is a
/// `BackupError::Clone`, which aborts the run.
pub async fn clone_if_absent(git: &Path, remote: &str, target: &Path) -> Result<Bootstrap, BackupError> {
    if target.exists() {
        tracing::debug!(path = %target.display(), "working copy exists, skipping clone");
        return Ok(Bootstrap::Reused);
    }
    let shown = redact_url(remote);
    let fail = |reason: String| BackupError::Clone {
        url: shown.clone(),
        reason: reason.replace(remote, &shown),
    };

    let args = [
        std::ffi::OsStr::new("clone"),
        std::ffi::OsStr::new(remote),
        target.as_os_str(),
    ];
    let out = run_git(git, None, args)
        .await
        .map_err(|e| fail(e.to_string()))?;
    if !out.success() {
        return Err(fail(out.stderr));
    }
    tracing::info!(remote = %shown, path = %target.display(), "repository cloned");
    Ok(Bootstrap::Cloned)
}
