//! `run_backup` from a config: clone, inventory, logs dir and report.

mod common;

use std::path::Path;

use common::GitFixture;
use netbak_core::backup::{run_backup, DeviceResult};
use netbak_core::config::NetbakConfig;
use netbak_core::error::BackupError;

/// Config pointing at `remote`, with a fresh work dir under the fixture and a
/// device session that fails fast on a closed local port.
fn config(fx: &GitFixture, remote: &Path, work: &str) -> NetbakConfig {
    let mut cfg = NetbakConfig::default();
    cfg.remote_url = remote.to_str().unwrap().to_string();
    cfg.work_dir = fx.tmp.path().join(work);
    cfg.inventory = "devices.csv".into();
    cfg.max_concurrent_sessions = 2;
    cfg.retry.max_attempts = 1;
    cfg.session.port = 1;
    cfg.session.connect_timeout_secs = 1;
    cfg.session.command_timeout_secs = 1;
    std::fs::create_dir_all(&cfg.work_dir).unwrap();
    cfg
}

#[tokio::test]
async fn clones_loads_inventory_and_reports_every_device() {
    let fx = GitFixture::new().await;
    let cfg = config(&fx, &fx.remote, "fresh");
    std::fs::write(
        cfg.work_dir.join("devices.csv"),
        "ip,username,password,platform,role\n127.0.0.1,admin,pw,huawei,core\n",
    )
    .unwrap();

    let report = run_backup(&cfg).await.unwrap();

    let repo_dir = cfg.work_dir.join("net-backup");
    assert!(repo_dir.join(".git").is_dir());
    assert!(cfg.work_dir.join("logs").is_dir());
    assert_eq!(report.len(), 1);
    let entry = report.entries()[0];
    assert_eq!(entry.device.address, "127.0.0.1");
    assert_eq!(entry.attempts, 1);
    match &entry.result {
        DeviceResult::PermanentFailure { reason } => {
            assert!(reason.contains("127.0.0.1"), "{reason}")
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_remote_is_a_fatal_clone_error() {
    let fx = GitFixture::new().await;
    let missing = fx.tmp.path().join("missing.git");
    let cfg = config(&fx, &missing, "bad-remote");
    std::fs::write(
        cfg.work_dir.join("devices.csv"),
        "ip,username,password,platform,role\n127.0.0.1,admin,pw,huawei,core\n",
    )
    .unwrap();

    let err = run_backup(&cfg).await.unwrap_err();

    assert!(
        matches!(err.downcast_ref::<BackupError>(), Some(BackupError::Clone { .. })),
        "{err:#}"
    );
    assert!(!cfg.work_dir.join("missing").exists());
}

#[tokio::test]
async fn missing_inventory_fails_after_clone() {
    let fx = GitFixture::new().await;
    let cfg = config(&fx, &fx.remote, "no-inventory");

    let err = run_backup(&cfg).await.unwrap_err();

    assert!(format!("{err:#}").contains("devices.csv"), "{err:#}");
    assert!(cfg.work_dir.join("net-backup").join(".git").is_dir());
}
