//! Delivery of session output to the result consumer.
//!
//! Callbacks run on the session task and must return quickly.

use crate::log::LogSink;
use crate::response::{ErrorKind, RecognitionResult, ServiceError};
use crate::session::state::SessionState;
use std::sync::{Arc, Mutex};

/// Error surfaced to the result consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorEvent {
    /// The service reported an error.
    Service(ServiceError),
    /// The session failed for a non-service reason (fatal transport error,
    /// protocol violation, reconnect attempts exhausted).
    Failed { kind: ErrorKind, message: String },
}

impl ErrorEvent {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorEvent::Service(e) => e.kind,
            ErrorEvent::Failed { kind, .. } => *kind,
        }
    }
}

/// Receives session output in arrival order.
pub trait SessionObserver: Send + Sync {
    fn on_result(&self, result: &RecognitionResult);

    fn on_error(&self, error: &ErrorEvent);

    fn on_state_changed(&self, _from: SessionState, _to: SessionState) {}
}

/// One item of session output.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Result(RecognitionResult),
    Error(ErrorEvent),
    State { from: SessionState, to: SessionState },
}

/// Observer that turns callbacks into an event stream.
pub struct ChannelObserver {
    tx: crossbeam_channel::Sender<SessionUpdate>,
    log: Arc<dyn LogSink>,
}

impl ChannelObserver {
    pub fn new(log: Arc<dyn LogSink>) -> (Self, crossbeam_channel::Receiver<SessionUpdate>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx, log }, rx)
    }

    fn forward(&self, update: SessionUpdate) {
        // Receiver gone means nobody is listening anymore.
        if let Err(e) = self.tx.try_send(update) {
            self.log.debug(
                "observer",
                &format!("session update dropped, no receiver: {:?}", e.into_inner()),
            );
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_result(&self, result: &RecognitionResult) {
        self.forward(SessionUpdate::Result(result.clone()));
    }

    fn on_error(&self, error: &ErrorEvent) {
        self.forward(SessionUpdate::Error(error.clone()));
    }

    fn on_state_changed(&self, from: SessionState, to: SessionState) {
        self.forward(SessionUpdate::State { from, to });
    }
}

/// Observer that keeps every update, for tests and batch use.
#[derive(Debug, Default)]
pub struct CollectorObserver {
    updates: Mutex<Vec<SessionUpdate>>,
}

impl CollectorObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<SessionUpdate> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn results(&self) -> Vec<RecognitionResult> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                SessionUpdate::Result(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<ErrorEvent> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                SessionUpdate::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Every state entered, in order.
    pub fn states(&self) -> Vec<SessionState> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                SessionUpdate::State { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    fn push(&self, update: SessionUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}

impl SessionObserver for CollectorObserver {
    fn on_result(&self, result: &RecognitionResult) {
        self.push(SessionUpdate::Result(result.clone()));
    }

    fn on_error(&self, error: &ErrorEvent) {
        self.push(SessionUpdate::Error(error.clone()));
    }

    fn on_state_changed(&self, from: SessionState, to: SessionState) {
        self.push(SessionUpdate::State { from, to });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogLevel, MemoryLog};

    fn result(text: &str) -> RecognitionResult {
        RecognitionResult {
            text: text.to_string(),
            is_final: false,
            confidence: 0.5,
            segment_id: "1".to_string(),
        }
    }

    #[test]
    fn test_channel_observer_preserves_order() {
        let (observer, rx) = ChannelObserver::new(Arc::new(MemoryLog::new()));
        observer.on_state_changed(SessionState::Idle, SessionState::Connecting);
        observer.on_result(&result("a"));
        observer.on_result(&result("b"));

        let updates: Vec<SessionUpdate> = rx.try_iter().collect();
        assert_eq!(updates.len(), 3);
        assert!(matches!(updates[1], SessionUpdate::Result(ref r) if r.text == "a"));
        assert!(matches!(updates[2], SessionUpdate::Result(ref r) if r.text == "b"));
    }

    #[test]
    fn test_channel_observer_reports_dropped_updates_to_log() {
        let log = Arc::new(MemoryLog::new());
        let (observer, rx) = ChannelObserver::new(log.clone());
        drop(rx);
        observer.on_result(&result("lost"));

        assert!(log.contains(LogLevel::Debug, "session update dropped"));
        assert!(log.contains(LogLevel::Debug, "lost"));
    }

    #[test]
    fn test_collector_filters() {
        let collector = CollectorObserver::new();
        collector.on_state_changed(SessionState::Idle, SessionState::Connecting);
        collector.on_result(&result("x"));
        collector.on_error(&ErrorEvent::Failed {
            kind: ErrorKind::Network,
            message: "gone".to_string(),
        });

        assert_eq!(collector.states(), vec![SessionState::Connecting]);
        assert_eq!(collector.results().len(), 1);
        assert_eq!(collector.errors()[0].kind(), ErrorKind::Network);
    }
}
