//! Device session abstraction.
//!
//! `SessionDriver` opens a `Session` to one device; a `Session` knows how to
//! run commands and wait for prompts. Negotiation (confirmation answer plus
//! pager disable) and the config fetch are expressed once, on top of those
//! primitives, from the device's `PlatformProfile`.
//!
//! Sessions are blocking; the orchestrator drives them from `spawn_blocking`.

mod prompt;
mod ssh;

use std::time::Duration;

use crate::error::BackupError;
use crate::inventory::DeviceDescriptor;
use crate::platform::PlatformProfile;

pub use prompt::PromptSession;
pub use ssh::{SshDriver, SshDriverSettings};

/// An open CLI session to one device.
pub trait Session: Send {
    /// Current prompt: the last non-empty line once output settles.
    fn find_prompt(&mut self) -> Result<String, BackupError>;

    /// Send `command` and wait until `expect` shows up in the reply.
    /// Fails with `BackupError::Protocol` if it never does within `timeout`.
    fn send_expect(
        &mut self,
        command: &str,
        expect: &str,
        timeout: Duration,
    ) -> Result<String, BackupError>;

    /// Send `command` and collect its output until the prompt returns.
    /// Pager markers matching `more_pattern` are answered with a space.
    /// Fails with `BackupError::Timeout` if the prompt does not return within `timeout`.
    fn send_command(
        &mut self,
        command: &str,
        timeout: Duration,
        more_pattern: Option<&str>,
    ) -> Result<String, BackupError>;

    /// Timeout applied to each negotiation step.
    fn command_timeout(&self) -> Duration;

    /// Answer the initial confirmation question (if the prompt asks one) and
    /// disable paging. Returns whether the negotiation sequence was sent.
    fn negotiate(&mut self, profile: &PlatformProfile) -> Result<bool, BackupError> {
        let prompt = self.find_prompt()?;
        if !prompt.contains(profile.confirmation_trigger) {
            return Ok(false);
        }
        let timeout = self.command_timeout();
        for step in std::iter::once(&profile.confirmation).chain(profile.pagination_disable) {
            self.send_expect(step.command, step.expect, timeout)?;
        }
        Ok(true)
    }

    /// Dump the running configuration.
    fn fetch_config(&mut self, profile: &PlatformProfile) -> Result<String, BackupError> {
        self.send_command(
            profile.fetch_command,
            profile.fetch_timeout,
            Some(profile.more_pattern),
        )
    }
}

/// Opens sessions to devices.
pub trait SessionDriver: Send + Sync {
    fn connect(&self, device: &DeviceDescriptor) -> Result<Box<dyn Session>, BackupError>;
}
