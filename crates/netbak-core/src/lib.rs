pub mod config;
pub mod logging;

pub mod backup;
pub mod checksum;
pub mod driver;
pub mod error;
pub mod git;
pub mod inventory;
pub mod limiter;
pub mod platform;
pub mod retry;
pub mod writer;
