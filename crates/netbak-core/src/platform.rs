//! Static per-platform capability table.
//!
//! Each supported platform has one `PlatformProfile` describing how to get a
//! session into a state where the running config can be dumped without a
//! pager, and which command dumps it. Adding a platform means adding a row.

use std::time::Duration;

use crate::error::BackupError;
use crate::inventory::Platform;

/// Default read timeout for the fetch command.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(1800);

/// A command sent during negotiation and the prompt that must follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptStep {
    pub command: &'static str,
    pub expect: &'static str,
}

/// Capabilities of one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub platform: &'static str,
    /// Substring of the initial prompt that means the device is waiting for a confirmation.
    pub confirmation_trigger: &'static str,
    /// Answer to the confirmation question.
    pub confirmation: PromptStep,
    /// Sent in order after the confirmation answer.
    pub pagination_disable: &'static [PromptStep],
    pub fetch_command: &'static str,
    pub fetch_timeout: Duration,
    /// Pager marker to answer with a space if paging is still on during fetch.
    pub more_pattern: &'static str,
}

impl PlatformProfile {
    /// Same profile with a different fetch timeout (from config).
    pub fn with_fetch_timeout(&self, timeout: Duration) -> Self {
        Self {
            fetch_timeout: timeout,
            ..self.clone()
        }
    }
}

const DECLINE: PromptStep = PromptStep {
    command: "N",
    expect: ">",
};

static PROFILES: &[PlatformProfile] = &[
    PlatformProfile {
        platform: "hp_comware",
        confirmation_trigger: "Y/N",
        confirmation: DECLINE,
        pagination_disable: &[PromptStep {
            command: "screen-length disable",
            expect: ">",
        }],
        fetch_command: "display current",
        fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        more_pattern: "---- More ----",
    },
    PlatformProfile {
        platform: "huawei",
        confirmation_trigger: "Y/N",
        confirmation: DECLINE,
        pagination_disable: &[PromptStep {
            command: "screen-length 0 temporary",
            expect: ">",
        }],
        fetch_command: "display current",
        fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        more_pattern: "---- More ----",
    },
    PlatformProfile {
        platform: "ruijie_os",
        confirmation_trigger: "Y/N",
        confirmation: DECLINE,
        pagination_disable: &[
            PromptStep {
                command: "terminal width 256",
                expect: "#",
            },
            PromptStep {
                command: "terminal length 0",
                expect: "#",
            },
        ],
        fetch_command: "show running-config",
        fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        more_pattern: " --More-- ",
    },
];

/// Look up the profile for `platform`. Unknown platforms fail immediately.
pub fn profile_for(platform: &Platform) -> Result<&'static PlatformProfile, BackupError> {
    PROFILES
        .iter()
        .find(|p| p.platform == platform.as_str())
        .ok_or_else(|| BackupError::Configuration(platform.to_string()))
}

/// All known profiles, in table order.
pub fn profiles() -> &'static [PlatformProfile] {
    PROFILES
}
