//! Server configuration

use crate::{Result, TetherError};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tether_proto::codec::DEFAULT_KEY;

/// Default listening port
pub const DEFAULT_PORT: u16 = 9000;

/// Default size of a single `Host::receive` read
pub const DEFAULT_RECV_SIZE: usize = 1024;

/// Dispatcher configuration, usually read from a JSON file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Listen backlog
    pub max_connections: u32,
    /// Extensions to load, in order
    pub extensions: Vec<String>,
    /// Transport codec key byte
    pub codec_key: u8,
    /// Read size used for handshakes and default receives
    pub recv_size: usize,
    /// Handshake timeout in milliseconds; `None` waits forever
    pub handshake_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_connections: 5,
            extensions: vec!["essentials".to_string()],
            codec_key: DEFAULT_KEY,
            recv_size: DEFAULT_RECV_SIZE,
            handshake_timeout_ms: None,
        }
    }
}

impl ServerConfig {
    /// Parse configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| TetherError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Reject values the dispatcher cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.recv_size == 0 {
            return Err(TetherError::Config("recv_size must be greater than zero".to_string()));
        }
        if self.max_connections == 0 {
            return Err(TetherError::Config("max_connections must be greater than zero".to_string()));
        }
        if self.handshake_timeout_ms == Some(0) {
            return Err(TetherError::Config(
                "handshake_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the listening address
    pub fn with_listen(mut self, listen: IpAddr) -> Self {
        self.listen = listen;
        self
    }

    /// Set the listening port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the extensions to load
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the transport codec key
    pub fn with_codec_key(mut self, key: u8) -> Self {
        self.codec_key = key;
        self
    }

    /// Set the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }

    /// Handshake timeout as a duration
    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_ms.map(Duration::from_millis)
    }
}
