//! voxwire - streaming speech recognition client
//!
//! Speaks the binary framing protocol of a remote ASR service over an
//! abstract transport, with reconnect-safe audio buffering.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod log;
pub mod protocol;
pub mod response;
pub mod session;
pub mod transport;

// Session API
pub use session::{
    ChannelObserver, CollectorObserver, Credentials, ErrorEvent, ReconnectPolicy, Session,
    SessionConfig, SessionObserver, SessionState, SessionUpdate,
};

// Transports
pub use transport::{Connection, ConnectRequest, FrameReceiver, FrameSender, Inbound, Transport};
pub use transport::{MockPeer, MockPeers, MockTransport};
#[cfg(feature = "websocket")]
pub use transport::WebSocketTransport;

// Server responses
pub use response::{ErrorBand, ErrorBands, ErrorKind, RecognitionResult, ResponseParser, ServiceError};

// Error handling
pub use error::{Result, VoxwireError};

// Logging
pub use log::{LogLevel, LogSink, MemoryLog, TracingLog};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
