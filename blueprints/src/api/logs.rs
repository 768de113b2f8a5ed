//! Load cycle log: every line goes to `tracing` and to the `/api/logs`
//! SSE stream.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    /// A phase finished; traced at info level with `outcome = "done"`.
    Success,
    Warning,
    Error,
}

/// One line of the load cycle log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth under the phase that produced the line.
    #[serde(default)]
    pub depth: u8,
    pub at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            depth: 0,
            at: Utc::now(),
        }
    }

    pub fn nested(self, depth: u8) -> Self {
        Self { depth, ..self }
    }

    fn trace(&self) {
        let (depth, message) = (self.depth, self.message.as_str());
        match self.level {
            LogLevel::Info => tracing::info!(depth, "{}", message),
            LogLevel::Success => tracing::info!(depth, outcome = "done", "{}", message),
            LogLevel::Warning => tracing::warn!(depth, "{}", message),
            LogLevel::Error => tracing::error!(depth, "{}", message),
        }
    }
}

/// Process-wide log bus.
pub static LOG_BROADCASTER: Lazy<LogBus> = Lazy::new(|| LogBus::new(256));

/// Fan-out of [`LogEntry`] values to live subscribers.
pub struct LogBus {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    pub fn log(&self, entry: LogEntry) {
        entry.trace();
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Error, msg));
}

/// Info line nested `depth` levels under the current phase.
pub fn log_info_indent(msg: impl Into<String>, depth: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg).nested(depth));
}
