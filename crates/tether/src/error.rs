//! Error types for the Tether library

use crate::command::CommandScope;
use std::net::SocketAddr;
use thiserror::Error;

/// Main error type for Tether operations
#[derive(Debug, Error)]
pub enum TetherError {
    /// Listening socket could not be bound
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Accept loop failed
    #[error("Accept failed: {0}")]
    Accept(std::io::Error),

    /// Handshake could not be read or parsed
    #[error("Handshake error: {0}")]
    Handshake(#[from] tether_proto::ProtocolError),

    /// Handshake did not arrive in time
    #[error("Handshake timed out after {ms}ms")]
    HandshakeTimeout {
        /// Configured timeout in milliseconds
        ms: u128,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation on a host whose connection is already closed
    #[error("Host {0} is closed")]
    HostClosed(SocketAddr),

    /// Selection id that does not resolve to a host
    #[error("Invalid host id {id:?}: {reason}")]
    InvalidHostId {
        /// The id as supplied
        id: String,
        /// Why it could not be resolved
        reason: String,
    },

    /// Command name registered twice in the same namespace
    #[error("Duplicate {scope} command: {name}")]
    DuplicateCommand {
        /// Namespace of the clash
        scope: CommandScope,
        /// Command name
        name: String,
    },

    /// Extension name not present in the catalog
    #[error("Unknown extension: {0}")]
    UnknownExtension(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dispatcher lifecycle misuse
    #[error("Dispatcher error: {0}")]
    Dispatcher(String),

    /// A command handler failed
    #[error("Command failed: {0}")]
    Command(String),
}

impl TetherError {
    /// Whether the error means the host's connection can no longer be used
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Io(_) | Self::HostClosed(_))
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {}", err))
    }
}
