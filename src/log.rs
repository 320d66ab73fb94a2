//! Logging capability injected into sessions.
//!
//! The core never writes to a global logger directly; it reports through a
//! [`LogSink`] handed in at construction.

use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Trait for receiving log records from a session.
pub trait LogSink: Send + Sync {
    /// Record a message from `component`.
    fn log(&self, level: LogLevel, component: &str, message: &str);

    fn debug(&self, component: &str, message: &str) {
        self.log(LogLevel::Debug, component, message);
    }

    fn info(&self, component: &str, message: &str) {
        self.log(LogLevel::Info, component, message);
    }

    fn warn(&self, component: &str, message: &str) {
        self.log(LogLevel::Warn, component, message);
    }

    fn error(&self, component: &str, message: &str) {
        self.log(LogLevel::Error, component, message);
    }
}

/// Forwards records to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn log(&self, level: LogLevel, component: &str, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(component = component, "{}", message),
            LogLevel::Info => tracing::info!(component = component, "{}", message),
            LogLevel::Warn => tracing::warn!(component = component, "{}", message),
            LogLevel::Error => tracing::error!(component = component, "{}", message),
        }
    }
}

/// Keeps records in memory. Used by tests to assert on reported events.
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<LogRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub component: String,
    pub message: String,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// True if any record at `level` or above contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|r| r.level >= level && r.message.contains(needle))
    }
}

impl LogSink for MemoryLog {
    fn log(&self, level: LogLevel, component: &str, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                component: component.to_string(),
                message: message.to_string(),
            });
        }
    }
}
