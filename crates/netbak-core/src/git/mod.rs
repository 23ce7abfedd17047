//! Git side of a backup: one-time working-copy bootstrap and the per-file
//! stage → commit → push transaction.
//!
//! Every invocation passes the repository explicitly (`git -C <repo>`); the
//! process working directory is never changed, so device tasks running in
//! parallel cannot point each other's git commands at the wrong tree.

mod bootstrap;
mod command;
mod pipeline;

pub use bootstrap::{clone_if_absent, redact_url, repo_dir_name, Bootstrap};
pub use pipeline::{classify_commit_output, CommitOutcome, CommitReceipt, GitCommitPipeline};
