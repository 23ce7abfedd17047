//! `netbak run` – back up every device and print a summary.

use anyhow::{Context, Result};
use netbak_core::backup::{self, BackupReport, DeviceResult};
use netbak_core::config::NetbakConfig;
use netbak_core::git::CommitOutcome;
use std::path::Path;

pub async fn run_backup_cmd(cfg: &NetbakConfig, report_json: Option<&Path>) -> Result<()> {
    let report = backup::run_backup(cfg).await?;

    print_summary(&report);

    if let Some(path) = report_json {
        let json = report.to_json_pretty()?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("report written to {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &BackupReport) {
    if report.is_empty() {
        println!("No devices in inventory.");
        return;
    }
    println!(
        "{:<18} {:<12} {:<10} {:<8} {:<10} {:<7} {}",
        "DEVICE", "PLATFORM", "ROLE", "TRIES", "COMMIT", "PUSHED", "SHA256 / REASON"
    );
    for r in report.entries() {
        let (commit, pushed, detail) = match &r.result {
            DeviceResult::Success {
                commit,
                pushed,
                sha256,
                ..
            } => (
                commit_label(*commit),
                match pushed {
                    Some(true) => "yes",
                    Some(false) => "no",
                    None => "-",
                },
                sha256.get(..12).unwrap_or(sha256).to_string(),
            ),
            DeviceResult::PermanentFailure { reason } => ("FAILED", "-", reason.clone()),
        };
        println!(
            "{:<18} {:<12} {:<10} {:<8} {:<10} {:<7} {}",
            r.device.address, r.device.platform.as_str(), r.device.role, r.attempts, commit, pushed, detail
        );
    }
    println!(
        "{} device(s): {} ok ({} committed, {} unchanged, {} commit failed), {} failed",
        report.len(),
        report.succeeded(),
        report.count_commit(CommitOutcome::Committed),
        report.count_commit(CommitOutcome::NoChange),
        report.count_commit(CommitOutcome::Failed),
        report.failed()
    );
}

fn commit_label(outcome: CommitOutcome) -> &'static str {
    match outcome {
        CommitOutcome::Committed => "committed",
        CommitOutcome::NoChange => "unchanged",
        CommitOutcome::Failed => "failed",
    }
}
