use crate::telemetry::{LogLevel, SharedLogger};
use std::any::Any;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a worker does when a task panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Log the panic and keep the worker running.
    #[default]
    LogAndContinue,
    /// Log the panic and let it unwind the worker thread. The pool's
    /// `wait` then reports [`Error::WorkerPanic`](crate::Error::WorkerPanic).
    Propagate,
    Abort,
}

pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
    logger: SharedLogger,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy, logger: SharedLogger) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
            logger,
        }
    }

    /// Run `f`, applying the strategy if it panics.
    ///
    /// `component` and `label` only feed the log line.
    pub fn execute<F>(&self, component: &str, label: &str, f: F) -> Result<(), PanicInfo>
    where
        F: FnOnce(),
    {
        let payload = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(()) => return Ok(()),
            Err(payload) => payload,
        };

        self.panic_count.fetch_add(1, Ordering::Relaxed);
        let info = PanicInfo::from_payload_ref(&*payload);
        self.logger.log(
            LogLevel::Error,
            component,
            &format!("task {} panicked: {}", label, info.message),
        );

        match self.strategy {
            PanicStrategy::LogAndContinue => Err(info),
            PanicStrategy::Propagate => resume_unwind(payload),
            PanicStrategy::Abort => std::process::abort(),
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl std::fmt::Debug for PanicHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicHandler")
            .field("strategy", &self.strategy)
            .field("panic_count", &self.panic_count())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        Self::from_payload_ref(&*payload)
    }

    fn from_payload_ref(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MemoryLogger;
    use std::sync::Arc;

    #[test]
    fn test_success_passes_through() {
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue, Arc::new(MemoryLogger::new()));
        assert!(handler.execute("pool p 0", "ok", || {}).is_ok());
        assert_eq!(handler.panic_count(), 0);
    }

    #[test]
    fn test_log_and_continue() {
        let logger = MemoryLogger::shared();
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue, logger.clone());

        for _ in 0..3 {
            let info = handler
                .execute("pool p 0", "bad", || panic!("boom"))
                .unwrap_err();
            assert_eq!(info.message, "boom");
        }

        assert_eq!(handler.panic_count(), 3);
        assert_eq!(logger.count("task bad panicked: boom"), 3);
        assert_eq!(logger.records()[0].level, LogLevel::Error);
    }

    #[test]
    fn test_propagate_resumes_unwind() {
        let logger = MemoryLogger::shared();
        let handler = PanicHandler::new(PanicStrategy::Propagate, logger.clone());

        let outer = catch_unwind(AssertUnwindSafe(|| {
            let _ = handler.execute("pool p 0", "fatal", || panic!("{}", String::from("owned")));
        }));

        assert!(outer.is_err());
        assert_eq!(handler.panic_count(), 1);
        assert!(logger.contains("task fatal panicked: owned"));
    }

    #[test]
    fn test_payload_messages() {
        assert_eq!(PanicInfo::from_payload(Box::new("static")).message, "static");
        assert_eq!(PanicInfo::from_payload(Box::new(String::from("heap"))).message, "heap");
        assert_eq!(PanicInfo::from_payload(Box::new(7u8)).message, "unknown panic");
    }
}
