//! # Tether Protocol
//!
//! Wire-level pieces shared by the Tether dispatcher and its agents: the
//! transport obfuscation codec and the connection handshake format.

#![warn(missing_docs)]

/// Byte-wise transport codec
pub mod codec;

/// Handshake message format
pub mod handshake;

/// Error types for protocol operations
pub mod error;

pub use codec::XorCodec;
pub use handshake::Handshake;
pub use error::ProtocolError;
