//! Transport obfuscation codec
//!
//! Every application byte on a host connection is XORed with a single key
//! byte in both directions. This hides payloads from casual inspection only;
//! it offers no confidentiality against anyone who looks.

use bytes::{Bytes, BytesMut};

/// Key byte used when none is configured
pub const DEFAULT_KEY: u8 = 0x41;

/// Stateless, self-inverse XOR codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorCodec {
    key: u8,
}

impl Default for XorCodec {
    fn default() -> Self {
        Self::new(DEFAULT_KEY)
    }
}

impl XorCodec {
    /// Create a codec with the given key byte
    pub fn new(key: u8) -> Self {
        Self { key }
    }

    /// Key byte in use
    pub fn key(&self) -> u8 {
        self.key
    }

    /// Transform a buffer in place
    pub fn apply(&self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte ^= self.key;
        }
    }

    /// Encode plaintext for the wire
    pub fn encode(&self, plaintext: &[u8]) -> Bytes {
        self.transform(plaintext)
    }

    /// Decode bytes read from the wire
    pub fn decode(&self, ciphertext: &[u8]) -> Bytes {
        self.transform(ciphertext)
    }

    fn transform(&self, data: &[u8]) -> Bytes {
        let mut buf = BytesMut::from(data);
        self.apply(&mut buf);
        buf.freeze()
    }
}
