//! Configuration structures for the CAT engine
//!
//! [`CatConfig`] carries the terminal-side policies that the protocol leaves
//! to the implementation: how absent alpha identifiers are treated, what to
//! do with commands the terminal does not support, and which language and
//! timezone the terminal reports to the card.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Text shown for a command whose alpha identifier is absent when the
/// terminal is configured to ask the user anyway.
pub const DEFAULT_ALPHA_TEXT: &str = "Default Message";

/// Maximum number of card slots a single registry may serve.
pub const MAX_SLOT_COUNT: usize = 8;

/// Policy for structurally valid proactive commands the terminal does not
/// implement (unknown type byte, or a known type with no handler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedCommandPolicy {
    /// Answer with a Terminal Response carrying CMD_DATA_NOT_UNDERSTOOD
    #[default]
    Respond,
    /// Send nothing; the card is left waiting for its own timeout
    Drop,
}

impl fmt::Display for UnsupportedCommandPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedCommandPolicy::Respond => write!(f, "respond"),
            UnsupportedCommandPolicy::Drop => write!(f, "drop"),
        }
    }
}

/// Source of the timezone reported in PROVIDE LOCAL INFORMATION (DTTZ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimezoneSetting {
    /// Use the host's local UTC offset
    #[default]
    Local,
    /// Report the timezone as unknown (0xFF)
    Unknown,
    /// Use `timezone_offset_minutes`
    Fixed,
}

/// CAT engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatConfig {
    /// Number of card slots served by the registry
    #[serde(default = "default_slot_count")]
    pub slot_count: usize,
    /// Capacity of every per-slot task queue
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Skip user confirmation for BIP commands without an alpha identifier
    #[serde(default)]
    pub no_alpha_user_confirmation: bool,
    /// Text substituted for an absent alpha identifier
    #[serde(default = "default_alpha_text")]
    pub default_alpha_text: String,
    /// Handling of unsupported proactive commands
    #[serde(default)]
    pub unsupported_command_policy: UnsupportedCommandPolicy,
    /// ISO 639-1 language code reported to the card
    #[serde(default = "default_language")]
    pub language: String,
    /// Timezone reported to the card
    #[serde(default)]
    pub timezone: TimezoneSetting,
    /// Offset from UTC in minutes, used with [`TimezoneSetting::Fixed`]
    #[serde(default)]
    pub timezone_offset_minutes: i32,
    /// Log filter level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_slot_count() -> usize {
    1
}

fn default_channel_capacity() -> usize {
    256
}

fn default_alpha_text() -> String {
    DEFAULT_ALPHA_TEXT.to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CatConfig {
    fn default() -> Self {
        Self {
            slot_count: default_slot_count(),
            channel_capacity: default_channel_capacity(),
            no_alpha_user_confirmation: false,
            default_alpha_text: default_alpha_text(),
            unsupported_command_policy: UnsupportedCommandPolicy::default(),
            language: default_language(),
            timezone: TimezoneSetting::default(),
            timezone_offset_minutes: 0,
            log_level: default_log_level(),
        }
    }
}

impl CatConfig {
    /// Returns the configured UTC offset in minutes, or `None` when the
    /// timezone must be reported as unknown.
    ///
    /// `local_offset_minutes` is the host offset, consulted only for
    /// [`TimezoneSetting::Local`].
    pub fn utc_offset_minutes(&self, local_offset_minutes: i32) -> Option<i32> {
        match self.timezone {
            TimezoneSetting::Local => Some(local_offset_minutes),
            TimezoneSetting::Unknown => None,
            TimezoneSetting::Fixed => Some(self.timezone_offset_minutes),
        }
    }
}
