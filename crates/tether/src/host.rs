//! Connected agents
//!
//! A [`Host`] owns one agent connection. The handshake runs as part of
//! [`Host::connect`], so a `Host` value always knows the agent's version and
//! type. All bytes pass through the transport codec.

use crate::config::{ServerConfig, DEFAULT_RECV_SIZE};
use crate::{Result, TetherError};
use bytes::Bytes;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tether_proto::{Handshake, XorCodec};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Byte stream a host can run over
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

/// Connection settings applied when a host is created
#[derive(Debug, Clone, Copy)]
pub struct HostOptions {
    /// Transport codec
    pub codec: XorCodec,
    /// Read size for the handshake and for [`Host::recv`]
    pub recv_size: usize,
    /// Give up on the handshake after this long
    pub handshake_timeout: Option<Duration>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            codec: XorCodec::default(),
            recv_size: DEFAULT_RECV_SIZE,
            handshake_timeout: None,
        }
    }
}

impl From<&ServerConfig> for HostOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            codec: XorCodec::new(config.codec_key),
            recv_size: config.recv_size,
            handshake_timeout: config.handshake_timeout(),
        }
    }
}

/// One connected remote agent
pub struct Host {
    /// Connection identity
    id: Uuid,
    /// Remote address
    addr: SocketAddr,
    /// Version token from the handshake
    version: String,
    /// Agent type token from the handshake
    agent_type: String,
    codec: XorCodec,
    recv_size: usize,
    /// `None` once closed
    stream: Mutex<Option<Box<dyn Stream>>>,
    closed: AtomicBool,
}

impl Host {
    /// Accept a connection with default options and run the handshake
    pub async fn connect<S>(stream: S, addr: SocketAddr) -> Result<Self>
    where
        S: Stream + 'static,
    {
        Self::connect_with(stream, addr, HostOptions::default()).await
    }

    /// Accept a connection and run the handshake.
    ///
    /// Reads a single chunk, decodes it and splits it into version and type.
    /// On failure the connection is dropped and the error returned.
    pub async fn connect_with<S>(mut stream: S, addr: SocketAddr, options: HostOptions) -> Result<Self>
    where
        S: Stream + 'static,
    {
        let mut buf = vec![0u8; options.recv_size.max(1)];
        let read = stream.read(&mut buf);
        let n = match options.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| TetherError::HandshakeTimeout { ms: limit.as_millis() })??,
            None => read.await?,
        };
        buf.truncate(n);
        options.codec.apply(&mut buf);

        let handshake = Handshake::from_bytes(&buf)?;
        debug!("Handshake from {}: {}", addr, handshake);

        Ok(Self {
            id: Uuid::new_v4(),
            addr,
            version: handshake.version,
            agent_type: handshake.agent_type,
            codec: options.codec,
            recv_size: options.recv_size,
            stream: Mutex::new(Some(Box::new(stream))),
            closed: AtomicBool::new(false),
        })
    }

    /// Connection identity
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Remote IP
    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Remote port
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Agent protocol version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Agent type
    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }

    /// Whether [`Host::close`] has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Encode and write a message, returning the number of bytes sent.
    /// Empty messages are not written.
    pub async fn send(&self, message: &[u8]) -> Result<usize> {
        if message.is_empty() {
            return Ok(0);
        }

        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TetherError::HostClosed(self.addr))?;

        let encoded = self.codec.encode(message);
        stream.write_all(&encoded).await?;
        stream.flush().await?;

        debug!("Sent {} bytes to {}", encoded.len(), self.addr);
        Ok(encoded.len())
    }

    /// Read at most `max_size` bytes and decode them.
    ///
    /// This is a single read; longer messages are not reassembled. A
    /// `max_size` of zero returns nothing without touching the connection,
    /// and end-of-stream yields an empty buffer.
    pub async fn receive(&self, max_size: usize) -> Result<Bytes> {
        if max_size == 0 {
            return Ok(Bytes::new());
        }

        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TetherError::HostClosed(self.addr))?;

        let mut buf = vec![0u8; max_size];
        let n = stream.read(&mut buf).await?;
        buf.truncate(n);
        self.codec.apply(&mut buf);

        debug!("Received {} bytes from {}", n, self.addr);
        Ok(Bytes::from(buf))
    }

    /// Read one chunk of the configured size
    pub async fn recv(&self) -> Result<Bytes> {
        self.receive(self.recv_size).await
    }

    /// Close the connection. Calling this more than once is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let stream = self.stream.lock().await.take();
        if let Some(mut stream) = stream {
            if let Err(e) = stream.shutdown().await {
                debug!("Shutdown of {} failed: {}", self.addr, e);
            }
        }

        info!("Closed host {}", self);
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Host {}

impl Hash for Host {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("version", &self.version)
            .field("agent_type", &self.agent_type)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} v{})", self.addr, self.agent_type, self.version)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    pub(crate) fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 1], port))
    }

    /// Connect a host over an in-memory pipe, returning the agent's end
    pub(crate) async fn connect_pair(handshake: &str, port: u16) -> (Host, DuplexStream) {
        let (mut agent, server) = tokio::io::duplex(4096);
        let codec = XorCodec::default();
        agent.write_all(&codec.encode(handshake.as_bytes())).await.unwrap();
        let host = Host::connect(server, addr(port)).await.unwrap();
        (host, agent)
    }

    #[tokio::test]
    async fn test_handshake_fields() {
        let (host, _agent) = connect_pair("1.2-full", 4000).await;

        assert_eq!(host.version(), "1.2");
        assert_eq!(host.agent_type(), "full");
        assert_eq!(host.ip(), IpAddr::from([10, 0, 0, 1]));
        assert_eq!(host.port(), 4000);
        assert!(!host.is_closed());
    }

    #[tokio::test]
    async fn test_handshake_without_delimiter_fails() {
        let (mut agent, server) = tokio::io::duplex(64);
        agent.write_all(&XorCodec::default().encode(b"1.2full")).await.unwrap();

        let result = Host::connect(server, addr(1)).await;
        assert!(matches!(result, Err(TetherError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_handshake_with_two_delimiters_fails() {
        let (mut agent, server) = tokio::io::duplex(64);
        agent.write_all(&XorCodec::default().encode(b"1-2-full")).await.unwrap();

        let result = Host::connect(server, addr(1)).await;
        assert!(matches!(result, Err(TetherError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_handshake_on_closed_connection_fails() {
        let (agent, server) = tokio::io::duplex(64);
        drop(agent);

        let result = Host::connect(server, addr(1)).await;
        assert!(matches!(result, Err(TetherError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (_agent, server) = tokio::io::duplex(64);
        let options = HostOptions {
            handshake_timeout: Some(Duration::from_millis(20)),
            ..HostOptions::default()
        };

        let result = Host::connect_with(server, addr(1), options).await;
        assert!(matches!(result, Err(TetherError::HandshakeTimeout { ms: 20 })));
    }

    #[tokio::test]
    async fn test_slow_handshake_within_sub_second_timeout() {
        let (mut agent, server) = tokio::io::duplex(64);
        let config = ServerConfig::default().with_handshake_timeout(Duration::from_millis(500));

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            agent.write_all(&XorCodec::default().encode(b"1.0-full")).await.unwrap();
            agent
        });

        let host = Host::connect_with(server, addr(1), HostOptions::from(&config)).await.unwrap();
        assert_eq!(host.agent_type(), "full");
        let _agent = writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_encodes() {
        let (host, mut agent) = connect_pair("1.0-full", 1).await;

        let sent = host.send(b"hello").await.unwrap();
        assert_eq!(sent, 5);

        let mut buf = [0u8; 5];
        agent.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, &XorCodec::default().encode(b"hello")[..]);
    }

    #[tokio::test]
    async fn test_send_empty_is_noop() {
        let (host, _agent) = connect_pair("1.0-full", 1).await;
        assert_eq!(host.send(b"").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_receive_decodes() {
        let (host, mut agent) = connect_pair("1.0-full", 1).await;

        agent.write_all(&XorCodec::default().encode(b"pong")).await.unwrap();
        let data = host.receive(1024).await.unwrap();
        assert_eq!(&data[..], b"pong");
    }

    #[tokio::test]
    async fn test_receive_single_chunk() {
        let (host, mut agent) = connect_pair("1.0-full", 1).await;

        agent.write_all(&XorCodec::default().encode(b"abcdef")).await.unwrap();
        assert_eq!(&host.receive(4).await.unwrap()[..], b"abcd");
        assert_eq!(&host.receive(4).await.unwrap()[..], b"ef");
    }

    #[tokio::test]
    async fn test_receive_zero_is_noop() {
        let (host, _agent) = connect_pair("1.0-full", 1).await;
        assert!(host.receive(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receive_end_of_stream() {
        let (host, agent) = connect_pair("1.0-full", 1).await;
        drop(agent);
        assert!(host.recv().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (host, _agent) = connect_pair("1.0-full", 1).await;

        host.close().await;
        assert!(host.is_closed());
        host.close().await;
        assert!(host.is_closed());

        assert!(matches!(host.send(b"x").await, Err(TetherError::HostClosed(_))));
        assert!(matches!(host.receive(8).await, Err(TetherError::HostClosed(_))));
    }

    #[tokio::test]
    async fn test_identity() {
        let (a, _agent_a) = connect_pair("1.0-full", 1).await;
        let (b, _agent_b) = connect_pair("1.0-full", 1).await;

        assert_eq!(a, a);
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_display() {
        let (host, _agent) = connect_pair("2.1-lite", 5555).await;
        assert_eq!(host.to_string(), "10.0.0.1:5555 (lite v2.1)");
    }
}
