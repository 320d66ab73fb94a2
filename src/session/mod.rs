//! Streaming recognition session: state machine, audio pipeline and the
//! actor that ties them to a transport.

pub mod config;
pub mod driver;
pub mod observer;
pub mod pipeline;
pub mod state;

pub use config::{Credentials, ReconnectPolicy, SessionConfig};
pub use driver::Session;
pub use observer::{
    ChannelObserver, CollectorObserver, ErrorEvent, SessionObserver, SessionUpdate,
};
pub use pipeline::{AudioChunk, AudioSendPipeline, PendingAudioQueue, SubmitOutcome};
pub use state::{SessionState, Transition, next_state};
