//! Logging and metrics for pools and managed sources.

pub mod logger;
pub mod metrics;

pub use logger::{default_logger, LogLevel, LogRecord, Logger, MemoryLogger, SharedLogger, TracingLogger};
pub use metrics::{Metrics, MetricsSnapshot};
