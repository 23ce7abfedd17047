//! Shared fixtures for integration tests: an instrumented in-memory device
//! driver and throwaway git remotes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netbak_core::driver::{Session, SessionDriver};
use netbak_core::error::BackupError;
use netbak_core::git::{self, GitCommitPipeline};
use netbak_core::inventory::DeviceDescriptor;

/// Counters shared between a `FakeDriver` and its sessions.
#[derive(Debug, Default)]
pub struct Counters {
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub connects: AtomicUsize,
}

/// In-memory devices. Each connect counts as an open session until the
/// session is dropped; `hold` keeps every session open that long.
pub struct FakeDriver {
    pub counters: Arc<Counters>,
    configs: Mutex<HashMap<String, String>>,
    failures_left: Mutex<HashMap<String, u32>>,
    attempts: Mutex<HashMap<String, u32>>,
    hold: Duration,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            configs: Mutex::new(HashMap::new()),
            failures_left: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            hold: Duration::ZERO,
        }
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Running config the device at `address` will return.
    pub fn set_config(&self, address: &str, text: &str) {
        self.configs
            .lock()
            .unwrap()
            .insert(address.to_string(), text.to_string());
    }

    /// Make the next `n` connects to `address` fail with a connection error.
    pub fn fail_next(&self, address: &str, n: u32) {
        self.failures_left
            .lock()
            .unwrap()
            .insert(address.to_string(), n);
    }

    /// Connect attempts seen for `address`.
    pub fn attempts(&self, address: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

impl SessionDriver for FakeDriver {
    fn connect(&self, device: &DeviceDescriptor) -> Result<Box<dyn Session>, BackupError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(device.address.clone())
            .or_default() += 1;
        self.counters.connects.fetch_add(1, Ordering::SeqCst);

        let now = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        let session = FakeSession {
            counters: Arc::clone(&self.counters),
            config: self
                .configs
                .lock()
                .unwrap()
                .get(&device.address)
                .cloned()
                .unwrap_or_else(|| format!("sysname {}\n", device.address)),
        };
        std::thread::sleep(self.hold);

        let mut failures = self.failures_left.lock().unwrap();
        if let Some(left) = failures.get_mut(&device.address) {
            if *left > 0 {
                *left -= 1;
                return Err(BackupError::Connection {
                    address: device.address.clone(),
                    reason: "connection refused".into(),
                });
            }
        }
        Ok(Box::new(session))
    }
}

struct FakeSession {
    counters: Arc<Counters>,
    config: String,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Session for FakeSession {
    fn find_prompt(&mut self) -> Result<String, BackupError> {
        Ok("<fake>".into())
    }

    fn send_expect(
        &mut self,
        _command: &str,
        expect: &str,
        _timeout: Duration,
    ) -> Result<String, BackupError> {
        Ok(expect.to_string())
    }

    fn send_command(
        &mut self,
        _command: &str,
        _timeout: Duration,
        _more_pattern: Option<&str>,
    ) -> Result<String, BackupError> {
        Ok(self.config.clone())
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

pub fn device(address: &str) -> DeviceDescriptor {
    DeviceDescriptor::new(address, "admin", "secret", "huawei", "core")
}

pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("LC_ALL", "C")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn set_identity(dir: &Path) {
    run_git(dir, &["config", "user.name", "netbak-test"]);
    run_git(dir, &["config", "user.email", "netbak@example.com"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);
}

/// A bare remote with one commit, and a working copy cloned from it.
pub struct GitFixture {
    pub tmp: tempfile::TempDir,
    pub remote: PathBuf,
    pub work_dir: PathBuf,
    pub repo_dir: PathBuf,
}

impl GitFixture {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let seed = tmp.path().join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        run_git(&seed, &["init"]);
        set_identity(&seed);
        run_git(&seed, &["commit", "--allow-empty", "-m", "initial"]);

        let remote = tmp.path().join("net-backup.git");
        run_git(
            tmp.path(),
            &["clone", "--bare", "seed", remote.to_str().unwrap()],
        );

        let work_dir = tmp.path().join("work");
        std::fs::create_dir_all(&work_dir).unwrap();
        let repo_dir = work_dir.join("net-backup");
        git::clone_if_absent(Path::new("git"), remote.to_str().unwrap(), &repo_dir)
            .await
            .unwrap();
        set_identity(&repo_dir);

        Self {
            tmp,
            remote,
            work_dir,
            repo_dir,
        }
    }

    pub fn pipeline(&self) -> Arc<GitCommitPipeline> {
        Arc::new(GitCommitPipeline::new(&self.repo_dir))
    }

    /// Commits on the working copy's HEAD.
    pub fn local_commits(&self) -> usize {
        count_commits(&self.repo_dir)
    }

    /// Commits on the remote's default branch.
    pub fn remote_commits(&self) -> usize {
        count_commits(&self.remote)
    }
}

fn count_commits(dir: &Path) -> usize {
    run_git(dir, &["rev-list", "--count", "HEAD"])
        .trim()
        .parse()
        .unwrap()
}
