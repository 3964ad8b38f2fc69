//! Configuration Loading for the CAT engine
//!
//! This module provides configuration loading and validation for
//! [`CatConfig`], the settings shared by every slot of a registry.
//!
//! # Example
//!
//! ```rust,ignore
//! use simcat_terminal::app::{load_cat_config, validate_cat_config};
//!
//! // Load and validate configuration
//! let config = load_cat_config("config/cat.yaml")?;
//! validate_cat_config(&config)?;
//! ```

use std::path::Path;

use simcat_common::{CatConfig, LogLevel, TimezoneSetting, MAX_SLOT_COUNT};
use thiserror::Error;

/// Largest UTC offset in minutes (UTC+14:00).
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Smallest UTC offset in minutes (UTC-12:00).
const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ConfigValidationError),
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Slot count outside 1..=MAX_SLOT_COUNT
    #[error("Invalid slot count: {0} (must be between 1 and {max})", max = MAX_SLOT_COUNT)]
    InvalidSlotCount(usize),

    /// Zero channel capacity
    #[error("Invalid channel capacity: {0} (must be greater than 0)")]
    InvalidChannelCapacity(usize),

    /// Language is not a two-letter code
    #[error("Invalid language: '{0}' (must be a two-letter ISO 639-1 code)")]
    InvalidLanguage(String),

    /// Unknown log level
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    /// Fixed timezone offset out of range or not on a quarter hour
    #[error("Invalid timezone offset: {0} minutes")]
    InvalidTimezoneOffset(i32),
}

/// Loads a CAT configuration from a YAML file.
///
/// Missing fields take their defaults. Call `validate_cat_config` after
/// loading for range checks.
///
/// # Arguments
///
/// * `path` - Path to the YAML configuration file
pub fn load_cat_config<P: AsRef<Path>>(path: P) -> Result<CatConfig, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_cat_config_from_str(&contents)
}

/// Loads a CAT configuration from a YAML string.
pub fn load_cat_config_from_str(yaml: &str) -> Result<CatConfig, ConfigError> {
    let config: CatConfig =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    Ok(config)
}

/// Validates a CAT configuration.
///
/// # Validation Rules
///
/// - Slot count must be between 1 and 8
/// - Channel capacity must be greater than 0
/// - Language must be two ASCII letters
/// - Log level must name a known level
/// - A fixed timezone offset must be a whole number of quarter hours
///   between UTC-12:00 and UTC+14:00
pub fn validate_cat_config(config: &CatConfig) -> Result<(), ConfigValidationError> {
    if config.slot_count == 0 || config.slot_count > MAX_SLOT_COUNT {
        return Err(ConfigValidationError::InvalidSlotCount(config.slot_count));
    }

    if config.channel_capacity == 0 {
        return Err(ConfigValidationError::InvalidChannelCapacity(
            config.channel_capacity,
        ));
    }

    if config.language.len() != 2 || !config.language.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigValidationError::InvalidLanguage(
            config.language.clone(),
        ));
    }

    if config.log_level.parse::<LogLevel>().is_err() {
        return Err(ConfigValidationError::InvalidLogLevel(
            config.log_level.clone(),
        ));
    }

    if config.timezone == TimezoneSetting::Fixed {
        let offset = config.timezone_offset_minutes;
        if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&offset) || offset % 15 != 0
        {
            return Err(ConfigValidationError::InvalidTimezoneOffset(offset));
        }
    }

    Ok(())
}

/// Loads and validates a CAT configuration in one step.
pub fn load_and_validate_cat_config<P: AsRef<Path>>(path: P) -> Result<CatConfig, ConfigError> {
    let config = load_cat_config(path)?;
    validate_cat_config(&config)?;
    Ok(config)
}
