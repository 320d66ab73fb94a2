//! Transport capability the session drives.
//!
//! A transport opens a bidirectional binary message channel and hands back
//! the two halves separately, so sends never wait on the receive loop.

pub mod mock;
#[cfg(feature = "websocket")]
pub mod websocket;

use crate::error::Result;

pub use mock::{MockPeer, MockPeers, MockTransport};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

/// Everything needed to open one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub endpoint: String,
    pub app_key: String,
    pub access_key: String,
    pub resource_id: String,
    /// Fresh per connection attempt, used for server-side tracing.
    pub connect_id: String,
}

/// One message received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Binary(Vec<u8>),
    /// Text messages are not part of the protocol and are discarded.
    Text(String),
}

/// Sending half of an open connection.
#[async_trait::async_trait]
pub trait FrameSender: Send {
    /// Hand one encoded frame to the transport.
    async fn send(&mut self, frame: Vec<u8>) -> Result<()>;

    /// Close the connection. Frames already handed over are not recalled.
    async fn close(&mut self) -> Result<()>;
}

/// Receiving half of an open connection.
#[async_trait::async_trait]
pub trait FrameReceiver: Send {
    /// Wait for the next message. `None` once the connection is closed.
    async fn recv(&mut self) -> Option<Result<Inbound>>;
}

/// An open connection split into its two halves.
pub struct Connection {
    pub sender: Box<dyn FrameSender>,
    pub receiver: Box<dyn FrameReceiver>,
}

/// Factory for connections. Implementations are interchangeable.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Open a new connection.
    ///
    /// # Errors
    /// Returns `VoxwireError::Transport`; `transient` tells the session
    /// whether a reconnect is worth attempting.
    async fn open(&self, request: &ConnectRequest) -> Result<Connection>;

    /// Name for logging.
    fn name(&self) -> &'static str {
        "transport"
    }
}
