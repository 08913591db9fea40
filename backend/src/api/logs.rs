//! Pipeline progress logging.
//!
//! Every entry is echoed to stderr and fanned out on a broadcast channel,
//! which the server exposes as Server-Sent Events. Stdout is left alone so
//! the CLI can stream messages on it.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Entries kept for slow SSE subscribers before they start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn marker(self) -> &'static str {
        match self {
            LogLevel::Info => "  ",
            LogLevel::Success => " ✓",
            LogLevel::Warning => " ⚠",
            LogLevel::Error => " ✗",
        }
    }
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth, for detail lines under a step
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// One-line rendering used on stderr.
    pub fn render(&self) -> String {
        format!(
            "{}{} {}",
            "   ".repeat(self.indent as usize),
            self.level.marker(),
            self.message
        )
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Print an entry to stderr and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        eprintln!("{}", entry.render());
        // No subscriber is not an error.
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
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

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_serialization() {
        let entry = LogEntry::new(LogLevel::Warning, "2 columns missing").with_indent(1);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({ "level": "warning", "message": "2 columns missing", "indent": 1 })
        );
    }

    #[test]
    fn test_render_indents() {
        let entry = LogEntry::new(LogLevel::Success, "done").with_indent(2);
        assert_eq!(entry.render(), "       ✓ done");
    }

    #[test]
    fn test_subscribers_receive_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.log(LogEntry::new(LogLevel::Info, "first"));
        broadcaster.log(LogEntry::new(LogLevel::Error, "second"));

        assert_eq!(rx.try_recv().unwrap().message, "first");
        assert_eq!(rx.try_recv().unwrap().level, LogLevel::Error);
    }

    #[test]
    fn test_log_without_subscribers() {
        LogBroadcaster::new().log(LogEntry::new(LogLevel::Info, "nobody listens"));
    }
}
