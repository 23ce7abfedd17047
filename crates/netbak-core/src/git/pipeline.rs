//! Stage → commit → push for one snapshot file.
//!
//! All device tasks share one working tree, so a whole transaction runs under
//! the pipeline's lock: two files' steps never interleave, while fetching and
//! writing for other devices carries on in parallel.
//!
//! Both the change check and the commit are limited to the one file, so other
//! devices' pending snapshots in the shared tree never affect the outcome.
//!
//! Chaining is lenient. A failed stage does not stop the commit, and push is
//! attempted after any commit result (including `Failed`) unless
//! `push_after_failed_commit` is off. Pushing after `NoChange` also flushes
//! commits an earlier run left unpushed.

use serde::Serialize;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::command::{run_git, GitOutput};
use crate::error::BackupError;

/// Classification of the commit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    /// New commit created for the file.
    Committed,
    /// File identical to the last commit.
    NoChange,
    /// Snapshot is on disk but not committed.
    Failed,
}

/// Result of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    pub outcome: CommitOutcome,
    /// `None` when push was skipped by policy.
    pub pushed: Option<bool>,
}

/// Classify `git commit` stdout for `filename`.
pub fn classify_commit_output(stdout: &str, filename: &str) -> CommitOutcome {
    if stdout.contains("nothing to commit") {
        CommitOutcome::NoChange
    } else if stdout.contains(&commit_subject_prefix(filename)) {
        CommitOutcome::Committed
    } else {
        CommitOutcome::Failed
    }
}

fn commit_subject_prefix(filename: &str) -> String {
    format!("backup {filename}")
}

/// Serialized git transactions against one working copy.
#[derive(Debug)]
pub struct GitCommitPipeline {
    repo_dir: PathBuf,
    git: PathBuf,
    push_after_failed_commit: bool,
    lock: Mutex<()>,
}

impl GitCommitPipeline {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            git: PathBuf::from("git"),
            push_after_failed_commit: true,
            lock: Mutex::new(()),
        }
    }

    /// Use a specific git executable.
    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_push_after_failed_commit(mut self, yes: bool) -> Self {
        self.push_after_failed_commit = yes;
        self
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Stage, commit and push `filename` (relative to the repository root).
    pub async fn commit_file(&self, filename: &str) -> CommitReceipt {
        let _txn = self.lock.lock().await;

        let staged = match self.stage(filename).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(file = filename, error = %e, "stage failed");
                false
            }
        };

        let outcome = match self.commit(filename, staged).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(file = filename, error = %e, "commit failed, snapshot left uncommitted");
                CommitOutcome::Failed
            }
        };
        match outcome {
            CommitOutcome::Committed => tracing::info!(file = filename, "committed"),
            CommitOutcome::NoChange => {
                tracing::warn!(file = filename, "nothing to commit, snapshot unchanged")
            }
            CommitOutcome::Failed => {}
        }

        let pushed = if outcome == CommitOutcome::Failed && !self.push_after_failed_commit {
            None
        } else {
            match self.push().await {
                Ok(()) => Some(true),
                Err(e) => {
                    tracing::error!(file = filename, error = %e, "push failed");
                    Some(false)
                }
            }
        };

        CommitReceipt { outcome, pushed }
    }

    async fn git(&self, step: &'static str, args: &[&str]) -> Result<GitOutput, BackupError> {
        run_git(&self.git, Some(self.repo_dir.as_path()), args)
            .await
            .map_err(|e| BackupError::GitOperation {
                step,
                code: None,
                stderr: e.to_string(),
            })
    }

    async fn stage(&self, filename: &str) -> Result<(), BackupError> {
        let out = self.git("add", &["add", "--", filename]).await?;
        check("add", out).map(|_| ())
    }

    /// Whether the index differs from HEAD for `filename`.
    async fn has_staged_change(&self, filename: &str) -> Result<bool, BackupError> {
        let out = self
            .git("diff", &["diff", "--cached", "--quiet", "--", filename])
            .await?;
        match out.code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(BackupError::GitOperation {
                step: "diff",
                code: out.code,
                stderr: out.stderr,
            }),
        }
    }

    async fn commit(&self, filename: &str, staged: bool) -> Result<CommitOutcome, BackupError> {
        // An unstaged file is never reported unchanged: it may not be tracked at all.
        if staged {
            match self.has_staged_change(filename).await {
                Ok(false) => return Ok(CommitOutcome::NoChange),
                Ok(true) => {}
                Err(e) => tracing::warn!(file = filename, error = %e, "change check failed"),
            }
        }
        let message = format!(
            "{} {}",
            commit_subject_prefix(filename),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f")
        );
        let out = self
            .git("commit", &["commit", "-m", &message, "--", filename])
            .await?;
        let outcome = classify_commit_output(&out.stdout, filename);
        if outcome == CommitOutcome::Failed {
            return Err(BackupError::GitOperation {
                step: "commit",
                code: out.code,
                stderr: first_non_empty(&out.stderr, &out.stdout),
            });
        }
        Ok(outcome)
    }

    async fn push(&self) -> Result<(), BackupError> {
        let out = self.git("push", &["push"]).await?;
        check("push", out).map(|_| ())
    }
}

fn check(step: &'static str, out: GitOutput) -> Result<GitOutput, BackupError> {
    if out.success() {
        return Ok(out);
    }
    Err(BackupError::GitOperation {
        step,
        code: out.code,
        stderr: out.stderr,
    })
}

fn first_non_empty(a: &str, b: &str) -> String {
    if a.trim().is_empty() {
        b.trim().to_string()
    } else {
        a.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "huawei-core-10.0.0.1-config.txt";

    #[test]
    fn nothing_to_commit_is_no_change() {
        let out = "On branch main\nYour branch is up to date with 'origin/main'.\n\n\
                   nothing to commit, working tree clean\n";
        assert_eq!(classify_commit_output(out, FILE), CommitOutcome::NoChange);
    }

    #[test]
    fn subject_in_summary_is_committed() {
        let out = format!(
            "[main 1a2b3c4] backup {FILE} 2026-10-15 02:00:00.123456\n 1 file changed, 3 insertions(+)\n"
        );
        assert_eq!(classify_commit_output(&out, FILE), CommitOutcome::Committed);
    }

    #[test]
    fn other_file_or_empty_output_is_failed() {
        let out = "[main 1a2b3c4] backup ruijie_os-access-10.0.0.2-config.txt now\n";
        assert_eq!(classify_commit_output(out, FILE), CommitOutcome::Failed);
        assert_eq!(classify_commit_output("", FILE), CommitOutcome::Failed);
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let out = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("LC_ALL", "C")
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).into_owned()
    }

    fn make_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init"]);
        git(dir.path(), &["config", "user.name", "netbak-test"]);
        git(dir.path(), &["config", "user.email", "netbak@example.com"]);
        git(dir.path(), &["config", "commit.gpgsign", "false"]);
        git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[tokio::test]
    async fn outcome_ignores_other_pending_files() {
        let repo = make_repo();
        let root = repo.path();
        let pipeline = GitCommitPipeline::new(root);
        std::fs::write(root.join("a.txt"), "one\n").unwrap();
        std::fs::write(root.join("c.txt"), "one\n").unwrap();
        assert_eq!(pipeline.commit_file("a.txt").await.outcome, CommitOutcome::Committed);
        assert_eq!(pipeline.commit_file("c.txt").await.outcome, CommitOutcome::Committed);

        // Untracked temp file and a modified tracked sibling.
        std::fs::write(root.join("b.txt.part"), "partial").unwrap();
        std::fs::write(root.join("c.txt"), "two\n").unwrap();
        std::fs::write(root.join("a.txt"), "one\n").unwrap();
        let receipt = pipeline.commit_file("a.txt").await;
        assert_eq!(receipt.outcome, CommitOutcome::NoChange);
        // No remote configured.
        assert_eq!(receipt.pushed, Some(false));

        std::fs::write(root.join("a.txt"), "two\n").unwrap();
        assert_eq!(pipeline.commit_file("a.txt").await.outcome, CommitOutcome::Committed);
        let status = git(root, &["status", "--porcelain"]);
        assert!(status.contains(" M c.txt"), "{status}");
        assert!(status.contains("?? b.txt.part"), "{status}");
        assert!(!status.contains("a.txt"), "{status}");
    }

    #[tokio::test]
    async fn untracked_file_that_fails_to_stage_is_not_unchanged() {
        let repo = make_repo();
        let pipeline = GitCommitPipeline::new(repo.path());
        let receipt = pipeline.commit_file("absent-config.txt").await;
        assert_eq!(receipt.outcome, CommitOutcome::Failed);
    }

    #[tokio::test]
    async fn missing_repository_yields_failed_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = GitCommitPipeline::new(dir.path().join("nope"));
        let receipt = pipeline.commit_file(FILE).await;
        assert_eq!(receipt.outcome, CommitOutcome::Failed);
        assert_eq!(receipt.pushed, Some(false));
    }

    #[tokio::test]
    async fn strict_policy_skips_push_after_failed_commit() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            GitCommitPipeline::new(dir.path().join("nope")).with_push_after_failed_commit(false);
        let receipt = pipeline.commit_file(FILE).await;
        assert_eq!(receipt.outcome, CommitOutcome::Failed);
        assert_eq!(receipt.pushed, None);
    }
}
