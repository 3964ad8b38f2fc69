//! Application support
//!
//! Configuration loading and validation, and the console front end used by
//! the `simcat` binary.

mod config_loader;
mod console;

pub use config_loader::{
    load_and_validate_cat_config, load_cat_config, load_cat_config_from_str, validate_cat_config,
    ConfigError, ConfigValidationError,
};
pub use console::{
    parse_console_command, ConsoleCollaborators, ConsoleCommand, ResponseSpec, CONSOLE_HELP,
};
