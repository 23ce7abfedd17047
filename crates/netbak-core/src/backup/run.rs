//! Fan-out of device tasks and the top-level `run_backup` entry point.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::attempt::{AttemptContext, AttemptSuccess};
use super::report::{BackupReport, DeviceReport, DeviceResult};
use super::state::{enter, DeviceState};
use crate::config::NetbakConfig;
use crate::driver::{SessionDriver, SshDriver, SshDriverSettings};
use crate::git::{self, GitCommitPipeline};
use crate::inventory::{self, DeviceDescriptor};
use crate::limiter::ConcurrencyLimiter;
use crate::retry::{run_with_retry, RetryDecision, RetryPolicy};
use crate::writer::ConfigWriter;

struct Shared {
    ctx: AttemptContext,
    limiter: ConcurrencyLimiter,
    policy: RetryPolicy,
}

/// Runs a set of devices through the backup lifecycle. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Config files are written into the pipeline's working copy.
    pub fn new(
        driver: Arc<dyn SessionDriver>,
        limiter: ConcurrencyLimiter,
        pipeline: Arc<GitCommitPipeline>,
        policy: RetryPolicy,
    ) -> Self {
        let writer = ConfigWriter::new(pipeline.repo_dir());
        Self {
            shared: Arc::new(Shared {
                ctx: AttemptContext {
                    driver,
                    writer,
                    pipeline,
                    fetch_timeout: None,
                },
                limiter,
                policy,
            }),
        }
    }

    /// Override every platform's config-dump timeout.
    pub fn with_fetch_timeout(self, timeout: Duration) -> Self {
        let mut ctx = self.shared.ctx.clone();
        ctx.fetch_timeout = Some(timeout);
        Self {
            shared: Arc::new(Shared {
                ctx,
                limiter: self.shared.limiter.clone(),
                policy: self.shared.policy,
            }),
        }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.shared.limiter
    }

    /// Back up every device concurrently (bounded by the limiter) and wait
    /// for all of them. Rows naming the same config file are backed up once;
    /// the first row wins.
    pub async fn run(&self, devices: Vec<DeviceDescriptor>) -> BackupReport {
        let unique = dedupe_by_stem(devices);

        let started = Instant::now();
        let mut join_set = tokio::task::JoinSet::new();
        for device in unique.iter().cloned() {
            enter(&device, 0, DeviceState::Pending);
            let shared = Arc::clone(&self.shared);
            join_set.spawn(async move { back_up_device(&shared, device).await });
        }

        let mut report = BackupReport::new();
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(device_report) => report.insert(device_report),
                Err(e) => tracing::error!("device task join: {}", e),
            }
        }
        for device in unique {
            if !report.contains(&device) {
                report.insert(DeviceReport::lost(device));
            }
        }

        tracing::info!(
            devices = report.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backup run finished"
        );
        report
    }
}

/// Keep the first row for each `{platform}-{role}-{address}`. Two rows with
/// the same stem would race on the same output file.
fn dedupe_by_stem(devices: Vec<DeviceDescriptor>) -> Vec<DeviceDescriptor> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<DeviceDescriptor> = Vec::with_capacity(devices.len());
    for device in devices {
        match seen.get(&device.stem()) {
            None => {
                seen.insert(device.stem(), unique.len());
                unique.push(device);
            }
            Some(&idx) => {
                let kept = &unique[idx];
                if kept.username != device.username || kept.password != device.password {
                    tracing::warn!(
                        device = %device,
                        "duplicate inventory row with different credentials skipped; keeping the first row"
                    );
                } else {
                    tracing::warn!(device = %device, "duplicate inventory row skipped");
                }
            }
        }
    }
    unique
}

async fn back_up_device(shared: &Shared, device: DeviceDescriptor) -> DeviceReport {
    let slot = shared.limiter.acquire().await;

    let ctx = &shared.ctx;
    let policy = &shared.policy;
    let dev = &device;
    let run = run_with_retry(policy, &device.address, move |attempt| async move {
        let result = ctx.run(dev, attempt).await;
        if let Err(e) = &result {
            if let RetryDecision::RetryAfter(_) = policy.decide(attempt, e) {
                enter(dev, attempt, DeviceState::RetryPending);
            }
        }
        result
    })
    .await;

    shared.limiter.release(slot);

    let result = match run.result {
        Ok(AttemptSuccess {
            receipt,
            path,
            sha256,
        }) => {
            enter(&device, run.attempts, DeviceState::Done);
            tracing::info!(
                device = %device,
                attempts = run.attempts,
                commit = ?receipt.outcome,
                pushed = ?receipt.pushed,
                "backup done"
            );
            DeviceResult::Success {
                commit: receipt.outcome,
                pushed: receipt.pushed,
                path,
                sha256,
            }
        }
        Err(e) => {
            enter(&device, run.attempts, DeviceState::Failed);
            DeviceResult::PermanentFailure {
                reason: e.to_string(),
            }
        }
    };

    DeviceReport {
        device,
        attempts: run.attempts,
        result,
        history: run.history,
    }
}

/// One full backup run from configuration: prepare directories, make sure the
/// working copy exists, load the inventory and back up every device.
///
/// Errors are fatal setup failures only; per-device failures are in the report.
pub async fn run_backup(cfg: &NetbakConfig) -> Result<BackupReport> {
    let log_dir = cfg.log_dir();
    tokio::fs::create_dir_all(&log_dir)
        .await
        .with_context(|| format!("create {}", log_dir.display()))?;

    let repo_dir = cfg.repo_dir()?;
    let bootstrap = git::clone_if_absent(&cfg.git.binary, &cfg.remote_url, &repo_dir).await?;
    tracing::info!(repo = %repo_dir.display(), ?bootstrap, "working copy ready");

    let inventory_path = cfg.inventory_path();
    let devices = inventory::load(&inventory_path)?;
    tracing::info!(
        devices = devices.len(),
        inventory = %inventory_path.display(),
        "inventory loaded"
    );

    let driver = SshDriver::new(SshDriverSettings {
        port: cfg.session.port,
        connect_timeout: Duration::from_secs(cfg.session.connect_timeout_secs),
        command_timeout: Duration::from_secs(cfg.session.command_timeout_secs),
        transcript_dir: Some(log_dir),
    });
    let pipeline = GitCommitPipeline::new(&repo_dir)
        .with_git(&cfg.git.binary)
        .with_push_after_failed_commit(cfg.git.push_after_failed_commit);

    let orchestrator = Orchestrator::new(
        Arc::new(driver),
        ConcurrencyLimiter::new(cfg.max_concurrent_sessions),
        Arc::new(pipeline),
        cfg.retry.policy(),
    )
    .with_fetch_timeout(cfg.fetch_timeout());

    Ok(orchestrator.run(devices).await)
}
