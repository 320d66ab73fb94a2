//! Session lifecycle states and the legal transitions between them.

use crate::error::{Result, VoxwireError};
use crate::response::ErrorKind;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Recognizing,
    Processing,
    Completed,
    Reconnecting,
    Failed(ErrorKind),
}

impl SessionState {
    /// States in which `send_audio` is accepted (sent or buffered).
    pub fn accepts_audio(self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Recognizing | SessionState::Reconnecting
        )
    }

    /// States that hold, or are acquiring, a live connection.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Connecting
                | SessionState::Recognizing
                | SessionState::Processing
                | SessionState::Reconnecting
        )
    }

    pub fn is_failed(self) -> bool {
        matches!(self, SessionState::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("Idle"),
            SessionState::Connecting => f.write_str("Connecting"),
            SessionState::Recognizing => f.write_str("Recognizing"),
            SessionState::Processing => f.write_str("Processing"),
            SessionState::Completed => f.write_str("Completed"),
            SessionState::Reconnecting => f.write_str("Reconnecting"),
            SessionState::Failed(kind) => write!(f, "Failed({})", kind),
        }
    }
}

/// Inputs that move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    HandshakeAcked,
    /// The last audio packet left the client.
    LastAudioSent,
    FinalResultReceived,
    Close,
    TransientError,
    BackoffElapsed,
    Fail(ErrorKind),
    Acknowledge,
}

/// Apply `transition` to `state`.
///
/// # Errors
/// Returns `VoxwireError::ProtocolViolation` for a transition that is not
/// legal from `state`.
pub fn next_state(state: SessionState, transition: Transition) -> Result<SessionState> {
    use SessionState::*;

    let next = match (state, transition) {
        (Idle, Transition::Start) => Connecting,
        (Connecting, Transition::HandshakeAcked) => Recognizing,
        (Recognizing, Transition::LastAudioSent) => Processing,
        (Processing, Transition::FinalResultReceived) => Completed,
        (Completed, Transition::Close) => Idle,
        (Connecting | Recognizing, Transition::TransientError) => Reconnecting,
        (Reconnecting, Transition::BackoffElapsed) => Connecting,
        (Connecting | Recognizing | Processing | Reconnecting, Transition::Fail(kind)) => {
            Failed(kind)
        }
        (Failed(_), Transition::Acknowledge) => Idle,
        (state, transition) => {
            return Err(VoxwireError::ProtocolViolation {
                message: format!("illegal transition {:?} from {}", transition, state),
            });
        }
    };
    Ok(next)
}
