//! Logging setup and CAT traffic tracing
//!
//! Subscribers are built on `tracing-subscriber`; `RUST_LOG` always takes
//! precedence over the level or filter passed in.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Verbosity accepted by the `log_level` config key and `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    /// Directive understood by [`EnvFilter`].
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "warning" {
            return Ok(LogLevel::Warn);
        }
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| format!("unknown log level: {s}"))
    }
}

/// Installs the global subscriber at `level`.
pub fn init_logging(level: LogLevel) {
    init_logging_with_filter(level.as_str());
}

/// Installs the global subscriber with an `EnvFilter` directive string.
///
/// ```
/// use simcat_common::logging::init_logging_with_filter;
///
/// init_logging_with_filter("info,simcat_terminal=debug");
/// ```
pub fn init_logging_with_filter(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Ignored when a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .try_init();
}

/// Direction of CAT traffic, seen from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the card
    Rx,
    /// To the card
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Rx => "RX",
            Direction::Tx => "TX",
        })
    }
}

/// Traces one CAT exchange: a summary at debug, the full payload at trace.
///
/// ```
/// use simcat_common::logging::{log_cat_message, Direction};
///
/// log_cat_message(Direction::Rx, "Proactive Command", &[0xD0, 0x03, 0x81, 0x01, 0x01]);
/// ```
pub fn log_cat_message(direction: Direction, kind: &str, data: &[u8]) {
    tracing::debug!(%direction, kind, len = data.len(), "CAT {kind}");
    tracing::trace!(%direction, kind, hex = %HexDump(data), "CAT payload");
}

/// Upper-case hex rendering of a byte slice for log fields.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}
