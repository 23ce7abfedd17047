//! CLI command handlers, one file per command.

mod completions;
mod inventory;
mod man;
mod platforms;
mod run;

pub use completions::run_completions;
pub use inventory::run_inventory;
pub use man::run_man;
pub use platforms::run_platforms;
pub use run::run_backup_cmd;
