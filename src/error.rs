//! Error types for voxwire.

use crate::response::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxwireError {
    // Wire format errors
    #[error("Malformed frame: {message}")]
    Format { message: String },

    #[error("Payload data error: {message}")]
    Data { message: String },

    #[error("Sequence numbers exhausted after {last}")]
    SequenceExhausted { last: i32 },

    #[error("Failed to parse server payload: {message}")]
    Parse { message: String },

    // Transport errors
    #[error("Transport error ({}): {message}", transience(.transient))]
    Transport { message: String, transient: bool },

    // Service errors reported by the ASR server
    #[error("Service error {code} ({kind}): {message}")]
    Service {
        kind: ErrorKind,
        code: i32,
        message: String,
    },

    // Session errors
    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    #[error("Operation '{operation}' not allowed in state {state}")]
    InvalidState { operation: String, state: String },

    #[error("Session is no longer running")]
    SessionClosed,

    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio input errors
    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Failed to read audio: {message}")]
    AudioRead { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl VoxwireError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            transient: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            transient: false,
        }
    }

    /// True for transport failures that should trigger a reconnect.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VoxwireError::Transport {
                transient: true,
                ..
            }
        )
    }

    /// Error kind reported when this error moves a session to `Failed`.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            VoxwireError::Service { kind, .. } => *kind,
            VoxwireError::Transport { .. } | VoxwireError::Io(_) => ErrorKind::Network,
            VoxwireError::ConfigParse { .. }
            | VoxwireError::ConfigInvalidValue { .. }
            | VoxwireError::Config(_) => ErrorKind::InvalidRequest,
            _ => ErrorKind::Unknown,
        }
    }
}

fn transience(transient: &bool) -> &'static str {
    if *transient { "transient" } else { "fatal" }
}

pub type Result<T> = std::result::Result<T, VoxwireError>;
