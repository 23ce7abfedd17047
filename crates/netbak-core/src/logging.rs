//! Logging init: stderr plus a daily-rotated warning/error file, or graceful
//! fallback to stderr only.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,netbak=debug";
/// Rotated error logs kept on disk.
const KEEP_LOG_FILES: usize = 7;

/// Rotated error log name: `backup-err.log.<date>`.
const ERROR_LOG_NAME: &str = "backup-err.log";

/// Daily-rotated `backup-err.log.<date>` appender in `log_dir`.
pub fn error_log_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    fs::create_dir_all(log_dir).with_context(|| format!("create {}", log_dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(ERROR_LOG_NAME)
        .max_log_files(KEEP_LOG_FILES)
        .build(log_dir)
        .with_context(|| format!("open error log in {}", log_dir.display()))
}

/// Initialize structured logging: everything passing `RUST_LOG` (default
/// `info,netbak=debug`) to stderr, WARN and above also to
/// `{log_dir}/backup-err.log.<date>`.
/// On failure (e.g. log dir unwritable), returns Err so the caller can fall back to stderr.
pub fn init_logging(log_dir: &Path) -> Result<()> {
    let appender = error_log_appender(log_dir)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(
            fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_filter(LevelFilter::WARN),
        )
        .try_init()?;

    tracing::info!("netbak logging initialized, errors also go to {}", log_dir.display());

    Ok(())
}

/// Initialize logging to stderr only (no file). Use when init_logging() fails so the CLI doesn't crash.
pub fn init_logging_stderr() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
