//! Operation logger injected into every handler
//!
//! Handlers report operation entry, exit and every classified failure through
//! an [`OperationLogger`]. The default sink discards everything so a handler
//! can be exercised without global logging state; the binary wires in
//! [`TracingLogger`].

use std::fmt;
use std::sync::{Arc, Mutex};

/// Severity of an operation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Leveled event sink consumed by the handlers
pub trait OperationLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl OperationLogger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl OperationLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "cloudrm", "{}", message),
            LogLevel::Info => tracing::info!(target: "cloudrm", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "cloudrm", "{}", message),
            LogLevel::Error => tracing::error!(target: "cloudrm", "{}", message),
        }
    }
}

/// Records events in memory so tests can assert on them
#[derive(Debug, Default)]
pub struct MemoryLogger {
    events: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events in order
    pub fn events(&self) -> Vec<(LogLevel, String)> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages recorded at exactly `level`
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    /// Highest severity recorded so far
    pub fn max_level(&self) -> Option<LogLevel> {
        self.events().iter().map(|(l, _)| *l).max()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl OperationLogger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((level, message.to_string()));
    }
}

/// Default sink handed to handlers that were not given one
pub fn noop() -> Arc<dyn OperationLogger> {
    Arc::new(NoopLogger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_records_in_order() {
        let logger = MemoryLogger::new();
        logger.info("first");
        logger.warning("second");
        logger.error("third");

        let events = logger.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], (LogLevel::Info, "first".to_string()));
        assert_eq!(logger.max_level(), Some(LogLevel::Error));
        assert_eq!(logger.messages_at(LogLevel::Warning), vec!["second".to_string()]);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_noop_logger_accepts_everything() {
        let logger = noop();
        logger.debug("ignored");
        logger.error("ignored");
    }
}
