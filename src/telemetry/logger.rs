//! Injected logging collaborator.
//!
//! Pools and managed sources never log through a global; they hold an
//! `Arc<dyn Logger>`. The default forwards to `tracing`, tests swap in a
//! [`MemoryLogger`] to assert on what was emitted.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Event severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Leveled sink for pool and source events.
///
/// `component` identifies the emitter, e.g. `pool ingest 3` for worker 3 of
/// the pool named `ingest`, or `source jobs` for a managed source.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, component: &str, message: &str);
}

/// Shared handle to a logger.
pub type SharedLogger = Arc<dyn Logger>;

/// The logger used when none is injected.
pub fn default_logger() -> SharedLogger {
    Arc::new(TracingLogger)
}

/// Forwards every record to the `tracing` facade under the `sourcepool` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, component: &str, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "sourcepool", component, "{}", message),
            LogLevel::Debug => tracing::debug!(target: "sourcepool", component, "{}", message),
            LogLevel::Info => tracing::info!(target: "sourcepool", component, "{}", message),
            LogLevel::Warn => tracing::warn!(target: "sourcepool", component, "{}", message),
            LogLevel::Error => tracing::error!(target: "sourcepool", component, "{}", message),
        }
    }
}

/// A single captured log line
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: Instant,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.level, self.component, self.message)
    }
}

/// Logger that keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning the logger already shared.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Snapshot of all records in emission order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Every record rendered as `LEVEL [component] message`.
    pub fn lines(&self) -> Vec<String> {
        self.records.lock().iter().map(ToString::to_string).collect()
    }

    /// Number of records whose message contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.message.contains(needle))
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.count(needle) > 0
    }

    /// Whether the messages contain every needle, in the given order.
    ///
    /// Unrelated records may appear between matches.
    pub fn contains_in_order(&self, needles: &[&str]) -> bool {
        let records = self.records.lock();
        let mut remaining = needles.iter().peekable();
        for record in records.iter() {
            match remaining.peek() {
                Some(needle) if record.message.contains(**needle) => {
                    remaining.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        remaining.peek().is_none()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, component: &str, message: &str) {
        self.records.lock().push(LogRecord {
            timestamp: Instant::now(),
            level,
            component: component.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_captures() {
        let logger = MemoryLogger::new();
        logger.log(LogLevel::Debug, "source jobs", "added task a");
        logger.log(LogLevel::Warn, "pool p 0", "input source closed: stopping");

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].level, LogLevel::Warn);
        assert_eq!(records[1].component, "pool p 0");
        assert_eq!(logger.lines()[0], "DEBUG [source jobs] added task a");
        assert_eq!(logger.count("added task"), 1);

        logger.clear();
        assert!(logger.records().is_empty());
    }

    #[test]
    fn test_contains_in_order() {
        let logger = MemoryLogger::new();
        for msg in ["one", "noise", "two", "three"] {
            logger.log(LogLevel::Info, "test", msg);
        }

        assert!(logger.contains_in_order(&["one", "two", "three"]));
        assert!(logger.contains_in_order(&[]));
        assert!(!logger.contains_in_order(&["two", "one"]));
    }

    #[test]
    fn test_tracing_logger_does_not_panic_without_subscriber() {
        let logger = default_logger();
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            logger.log(level, "test", "message");
        }
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Info.to_string(), "INFO");
    }
}
