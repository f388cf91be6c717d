//! Error types for protocol operations

use thiserror::Error;

/// Protocol-specific errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Handshake did not contain exactly one delimiter
    #[error("Invalid handshake {message:?}: expected exactly one '{delimiter}' separator, found {found}")]
    InvalidHandshake {
        /// Decoded handshake text
        message: String,
        /// Expected delimiter
        delimiter: char,
        /// Number of delimiters actually present
        found: usize,
    },

    /// Handshake bytes were not valid UTF-8
    #[error("Handshake is not valid UTF-8: {0}")]
    InvalidUtf8(String),
}
