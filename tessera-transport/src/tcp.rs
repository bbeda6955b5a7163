//! TCP transport.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use tessera_core::{ChannelConfig, TesseraError, TransportError, TypeRegistry};

use crate::channel::Channel;

/// A channel over a TCP connection.
pub type TcpChannel = Channel<TcpStream>;

/// Configuration for TCP client.
#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    /// Enable TCP nodelay.
    pub nodelay: bool,

    /// Framing limits for the resulting channel.
    pub channel: ChannelConfig,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            nodelay: true,
            channel: ChannelConfig::default(),
        }
    }
}

impl TcpClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }
}

/// Opens channels to remote peers.
pub struct TcpClient {
    config: TcpClientConfig,
    registry: Arc<TypeRegistry>,
}

impl TcpClient {
    /// Create a client with default configuration.
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(TcpClientConfig::default(), registry)
    }

    #[must_use]
    pub fn with_config(config: TcpClientConfig, registry: Arc<TypeRegistry>) -> Self {
        Self { config, registry }
    }

    /// Connect and wrap the stream in a channel.
    pub async fn connect(&self, addr: impl ToSocketAddrs) -> Result<TcpChannel, TesseraError> {
        let stream = TcpStream::connect(addr).await.map_err(TransportError::from_io)?;
        stream
            .set_nodelay(self.config.nodelay)
            .map_err(TransportError::from_io)?;

        tracing::debug!(peer = ?stream.peer_addr().ok(), "connected");
        Ok(Channel::with_config(
            stream,
            self.registry.clone(),
            self.config.channel.clone(),
        ))
    }
}

/// Configuration for TCP server.
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    /// Address to bind to.
    pub bind_addr: String,

    /// Enable TCP nodelay on accepted connections.
    pub nodelay: bool,

    /// Framing limits for accepted channels.
    pub channel: ChannelConfig,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".to_string(),
            nodelay: true,
            channel: ChannelConfig::default(),
        }
    }
}

impl TcpServerConfig {
    #[must_use]
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }
}

/// Accepts connections and hands out one channel per peer.
pub struct TcpServer {
    listener: TcpListener,
    config: TcpServerConfig,
    registry: Arc<TypeRegistry>,
}

impl TcpServer {
    /// Bind to `config.bind_addr`.
    pub async fn bind(
        config: TcpServerConfig,
        registry: Arc<TypeRegistry>,
    ) -> Result<Self, TesseraError> {
        let listener = TcpListener::bind(config.bind_addr.as_str())
            .await
            .map_err(TransportError::from_io)?;
        tracing::debug!(addr = ?listener.local_addr().ok(), "listening");
        Ok(Self {
            listener,
            config,
            registry,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TesseraError> {
        Ok(self.listener.local_addr().map_err(TransportError::from_io)?)
    }

    /// Wait for the next peer.
    pub async fn accept(&self) -> Result<(TcpChannel, SocketAddr), TesseraError> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::from_io)?;
        stream
            .set_nodelay(self.config.nodelay)
            .map_err(TransportError::from_io)?;

        tracing::debug!(%peer, "accepted connection");
        let channel = Channel::with_config(stream, self.registry.clone(), self.config.channel.clone());
        Ok((channel, peer))
    }
}
