//! Error types for simcat

use thiserror::Error;

/// Errors raised while interpreting operator input (console lines, hex
/// payloads) before anything reaches a card slot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed or incomplete input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Hex payload parsing errors.
    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
