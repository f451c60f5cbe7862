// worker thread loop
use super::panic_handler::PanicHandler;
use super::task::BoxedTask;
use crate::cancel::CancelSignal;
use crate::channel::Receiver;
use crate::telemetry::{LogLevel, Metrics, SharedLogger};
use crossbeam_channel::select;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The pool's cancellation signal fired.
    Cancelled,
    /// Every sender on the inbound point was dropped.
    InboundClosed,
}

// decrements the live count however the worker exits, unwinding included
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct Worker {
    pub component: String,
    pub verbose: bool,
    pub inbound: Receiver<BoxedTask>,
    pub cancel: CancelSignal,
    pub logger: SharedLogger,
    pub metrics: Arc<Metrics>,
    pub panic_handler: Arc<PanicHandler>,
    pub live: Arc<AtomicUsize>,
}

impl Worker {
    // main loop
    pub fn run(self) -> StopReason {
        let _live = LiveGuard(self.live.clone());

        loop {
            // Don't take new work once cancelled, even if a task is on offer.
            if self.cancel.is_cancelled() {
                return self.stopping(StopReason::Cancelled);
            }

            let stop = select! {
                recv(self.cancel.receiver()) -> _ => Some(StopReason::Cancelled),
                recv(self.inbound) -> msg => match msg {
                    Ok(task) => {
                        self.execute_task(task);
                        None
                    }
                    // Cancellation wins if it raced with the point closing.
                    Err(_) if self.cancel.is_cancelled() => Some(StopReason::Cancelled),
                    Err(_) => Some(StopReason::InboundClosed),
                },
            };

            if let Some(reason) = stop {
                return self.stopping(reason);
            }
        }
    }

    fn stopping(&self, reason: StopReason) -> StopReason {
        match reason {
            StopReason::Cancelled => {
                if self.verbose {
                    self.logger.log(
                        LogLevel::Debug,
                        &self.component,
                        "stop requested: stopping",
                    );
                }
            }
            StopReason::InboundClosed => {
                self.logger.log(
                    LogLevel::Warn,
                    &self.component,
                    "input source closed: stopping",
                );
            }
        }
        reason
    }

    fn execute_task(&self, task: BoxedTask) {
        let label = task.to_string();
        if self.verbose {
            self.logger.log(
                LogLevel::Debug,
                &self.component,
                &format!("starting task: {}", label),
            );
        }

        self.metrics.record_task_started();
        let start = Instant::now();
        let result = self
            .panic_handler
            .execute(&self.component, &label, || task.run(&self.cancel));
        let duration = start.elapsed();

        match result {
            Ok(()) => {
                self.metrics.record_task_finished(duration);
                if self.verbose {
                    self.logger.log(
                        LogLevel::Debug,
                        &self.component,
                        &format!("finished task (duration {:?}): {}", duration, label),
                    );
                }
            }
            Err(_) => self.metrics.record_task_panic(duration),
        }
    }
}
