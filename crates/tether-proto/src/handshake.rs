//! Handshake message format
//!
//! The first message an agent sends after connecting is `<version>-<type>`,
//! for example `1.0-full`.

use crate::ProtocolError;
use std::fmt;

/// Separator between the version and type tokens
pub const HANDSHAKE_DELIMITER: char = '-';

/// Agent identity declared in the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Protocol version token
    pub version: String,
    /// Agent type token
    pub agent_type: String,
}

impl Handshake {
    /// Create a handshake from its two tokens
    pub fn new(version: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            agent_type: agent_type.into(),
        }
    }

    /// Parse decoded handshake text.
    ///
    /// Exactly one delimiter must be present. Tokens are taken as-is, without
    /// trimming or further validation, so empty tokens are accepted.
    pub fn parse(message: &str) -> Result<Self, ProtocolError> {
        let found = message.matches(HANDSHAKE_DELIMITER).count();
        match message.split_once(HANDSHAKE_DELIMITER) {
            Some((version, agent_type)) if found == 1 => Ok(Self::new(version, agent_type)),
            _ => Err(ProtocolError::InvalidHandshake {
                message: message.to_string(),
                delimiter: HANDSHAKE_DELIMITER,
                found,
            }),
        }
    }

    /// Parse decoded handshake bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let message = std::str::from_utf8(bytes)
            .map_err(|e| ProtocolError::InvalidUtf8(e.to_string()))?;
        Self::parse(message)
    }

    /// Render the handshake as an agent would send it, before encoding
    pub fn to_wire(&self) -> String {
        format!("{}{}{}", self.version, HANDSHAKE_DELIMITER, self.agent_type)
    }
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let handshake = Handshake::parse("1.2-full").unwrap();
        assert_eq!(handshake.version, "1.2");
        assert_eq!(handshake.agent_type, "full");
    }

    #[test]
    fn test_parse_without_delimiter() {
        let result = Handshake::parse("1.2full");
        assert_eq!(
            result,
            Err(ProtocolError::InvalidHandshake {
                message: "1.2full".to_string(),
                delimiter: '-',
                found: 0,
            })
        );
    }

    #[test]
    fn test_parse_with_two_delimiters() {
        let result = Handshake::parse("1.2-full-extra");
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidHandshake { found: 2, .. })
        ));
    }

    #[test]
    fn test_parse_empty() {
        assert!(Handshake::parse("").is_err());
    }

    #[test]
    fn test_parse_keeps_tokens_verbatim() {
        let handshake = Handshake::parse("-lite\n").unwrap();
        assert_eq!(handshake.version, "");
        assert_eq!(handshake.agent_type, "lite\n");
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        let result = Handshake::from_bytes(&[0x31, 0x2D, 0xFF, 0xFE]);
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8(_))));
    }

    #[test]
    fn test_wire_form() {
        let handshake = Handshake::new("1.0", "lite");
        assert_eq!(handshake.to_wire(), "1.0-lite");
        assert_eq!(handshake.to_string(), "1.0-lite");
        assert_eq!(Handshake::parse(&handshake.to_wire()).unwrap(), handshake);
    }
}
