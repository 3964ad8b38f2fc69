//! Common types and utilities for simcat
//!
//! This crate provides the configuration structures, error type and logging
//! helpers shared by the protocol and terminal crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    CatConfig, TimezoneSetting, UnsupportedCommandPolicy, DEFAULT_ALPHA_TEXT, MAX_SLOT_COUNT,
};
pub use error::Error;
pub use logging::{
    init_logging, init_logging_with_filter, log_cat_message, Direction, HexDump, LogLevel,
};
