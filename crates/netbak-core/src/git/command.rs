//! Spawning git as a child process.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Captured result of one git invocation.
#[derive(Debug)]
pub(crate) struct GitOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `git [-C repo] args...` and capture its output.
///
/// The locale is pinned so output can be matched on, and git never prompts
/// for credentials (a prompt would hang the run with no terminal attached).
pub(crate) async fn run_git<I, S>(git: &Path, repo: Option<&Path>, args: I) -> std::io::Result<GitOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(git);
    if let Some(repo) = repo {
        cmd.arg("-C").arg(repo);
    }
    let out = cmd
        .args(args)
        .env("LC_ALL", "C")
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;
    Ok(GitOutput {
        code: out.status.code(),
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
    })
}
