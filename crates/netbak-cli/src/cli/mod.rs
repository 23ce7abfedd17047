//! CLI for netbak.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use netbak_core::config::{self, NetbakConfig};
use netbak_core::logging;
use std::path::{Path, PathBuf};

use commands::{run_backup_cmd, run_completions, run_inventory, run_man, run_platforms};

/// Top-level CLI for netbak.
#[derive(Debug, Parser)]
#[command(name = "netbak", version)]
#[command(about = "netbak: back up network device configs into git", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Back up every device in the inventory, then commit and push each config.
    Run {
        /// Config file (default: ~/.config/netbak/config.toml).
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Inventory CSV, overriding the config.
        #[arg(long, value_name = "FILE")]
        inventory: Option<PathBuf>,
        /// Maximum device sessions at once, overriding max_concurrent_sessions.
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Attempts per device, overriding retry.max_attempts.
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,
        /// Also write the run report as JSON (passwords omitted).
        #[arg(long, value_name = "FILE")]
        report_json: Option<PathBuf>,
    },

    /// Validate the inventory and list its devices.
    Inventory {
        /// Config file (default: ~/.config/netbak/config.toml).
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Inventory CSV, overriding the config.
        #[arg(long, value_name = "FILE")]
        inventory: Option<PathBuf>,
    },

    /// Show supported platforms and how each one is fetched.
    Platforms,

    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the man page.
    Man,
}

fn load_config(path: Option<&Path>) -> Result<NetbakConfig> {
    let cfg = match path {
        Some(p) => config::load_from(p)?,
        None => config::load_or_init()?,
    };
    tracing::debug!("loaded config: work_dir={}", cfg.work_dir.display());
    Ok(cfg)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Run {
                config,
                inventory,
                jobs,
                max_attempts,
                report_json,
            } => {
                let mut cfg = load_config(config.as_deref())?;
                if let Some(p) = inventory {
                    cfg.inventory = p;
                }
                if let Some(n) = jobs {
                    cfg.max_concurrent_sessions = n;
                }
                if let Some(n) = max_attempts {
                    cfg.retry.max_attempts = n;
                }
                if let Err(e) = logging::init_logging(&cfg.log_dir()) {
                    logging::init_logging_stderr();
                    tracing::warn!("error log file unavailable ({:#}), logging to stderr only", e);
                }
                run_backup_cmd(&cfg, report_json.as_deref()).await?;
            }
            CliCommand::Inventory { config, inventory } => {
                logging::init_logging_stderr();
                let mut cfg = load_config(config.as_deref())?;
                if let Some(p) = inventory {
                    cfg.inventory = p;
                }
                run_inventory(&cfg)?;
            }
            CliCommand::Platforms => run_platforms(),
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
