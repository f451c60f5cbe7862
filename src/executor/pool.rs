use super::panic_handler::{PanicHandler, PanicInfo};
use super::task::BoxedTask;
use super::worker::{StopReason, Worker, WorkerId};
use crate::cancel::CancelSignal;
use crate::channel::Receiver;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::telemetry::{default_logger, Metrics, MetricsSnapshot, SharedLogger};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A fixed set of worker threads pulling tasks from one inbound point.
///
/// Workers start immediately. Each one loops: wait for the cancellation
/// signal or a task, run the task with the signal, repeat. A worker stops
/// when the signal fires (finishing whatever it is running first) or when
/// the inbound point is closed. Firing the signal alone does not mean the
/// pool is done; call [`wait`](Self::wait) for that.
///
/// A task that panics is caught by default: the panic is logged at error
/// level and counted, and the worker moves on to the next task. Choose
/// [`PanicStrategy::Propagate`](crate::PanicStrategy::Propagate) to let the
/// panic take the worker down instead, or
/// [`PanicStrategy::Abort`](crate::PanicStrategy::Abort) to end the process.
///
/// Workers observe a child of the signal passed in, so the pool never fires
/// the caller's signal; [`cancel_signal`](Self::cancel_signal) returns that
/// child.
pub struct WorkerPool {
    name: Arc<str>,
    workers: Vec<WorkerHandle>,
    live: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
    panic_handler: Arc<PanicHandler>,
    cancel: CancelSignal,
}

type SpawnFn<'a> =
    dyn FnMut(thread::Builder, Worker) -> io::Result<JoinHandle<StopReason>> + 'a;

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<StopReason>>,
}

impl WorkerPool {
    /// Start `workers` threads named after `name`, logging through `tracing`.
    ///
    /// With `verbose`, task start/finish and stop requests are logged at
    /// debug level; a closed inbound point is always logged.
    pub fn new<S: Into<String>>(
        name: S,
        workers: usize,
        verbose: bool,
        cancel: CancelSignal,
        inbound: Receiver<BoxedTask>,
    ) -> Result<Self> {
        let config = PoolConfig::builder()
            .name(name)
            .num_threads(workers)
            .verbose(verbose)
            .build()?;
        Self::with_config(&config, cancel, inbound)
    }

    pub fn with_config(
        config: &PoolConfig,
        cancel: CancelSignal,
        inbound: Receiver<BoxedTask>,
    ) -> Result<Self> {
        Self::with_logger(config, cancel, inbound, default_logger())
    }

    pub fn with_logger(
        config: &PoolConfig,
        cancel: CancelSignal,
        inbound: Receiver<BoxedTask>,
        logger: SharedLogger,
    ) -> Result<Self> {
        Self::start(
            config,
            cancel,
            inbound,
            logger,
            &mut |builder: thread::Builder, worker: Worker| builder.spawn(move || worker.run()),
        )
    }

    // Workers run on a child of `cancel` so a failed start can stop the ones
    // already spawned without firing the caller's signal.
    fn start(
        config: &PoolConfig,
        cancel: CancelSignal,
        inbound: Receiver<BoxedTask>,
        logger: SharedLogger,
        spawn: &mut SpawnFn<'_>,
    ) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        let name: Arc<str> = Arc::from(config.name.as_str());
        let cancel = cancel.child();
        let live = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(Metrics::new());
        let panic_handler = Arc::new(PanicHandler::new(config.panic_strategy, logger.clone()));

        let mut pool = Self {
            name,
            workers: Vec::with_capacity(num_threads),
            live,
            metrics,
            panic_handler,
            cancel,
        };

        for id in 0..num_threads {
            let worker = Worker {
                component: format!("pool {} {}", pool.name, id),
                verbose: config.verbose,
                inbound: inbound.clone(),
                cancel: pool.cancel.clone(),
                logger: logger.clone(),
                metrics: pool.metrics.clone(),
                panic_handler: pool.panic_handler.clone(),
                live: pool.live.clone(),
            };

            let mut builder =
                thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            pool.live.fetch_add(1, Ordering::AcqRel);
            match spawn(builder, worker) {
                Ok(thread) => pool.workers.push(WorkerHandle {
                    id,
                    thread: Some(thread),
                }),
                Err(e) => {
                    pool.live.fetch_sub(1, Ordering::AcqRel);
                    pool.cancel.cancel();
                    // Join the started workers; their outcome is moot.
                    let _ = pool.wait();
                    return Err(Error::executor(format!(
                        "failed to spawn worker {} of {}: {}",
                        id, pool.name, e
                    )));
                }
            }
        }

        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Workers that have not yet exited their loop.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.live_workers() == 0
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Tasks that have returned or panicked so far.
    pub fn tasks_completed(&self) -> u64 {
        self.metrics.tasks_completed()
    }

    pub fn panic_count(&self) -> usize {
        self.panic_handler.panic_count()
    }

    /// Block until every worker has exited.
    ///
    /// Returns why each worker stopped, indexed by worker id. Calling it
    /// again after it returned yields an empty list. Never returns if the
    /// cancellation signal never fires and the inbound point stays open.
    pub fn wait(&mut self) -> Result<Vec<StopReason>> {
        let mut reasons = Vec::with_capacity(self.workers.len());
        let mut first_panic = None;

        for worker in &mut self.workers {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            match thread.join() {
                Ok(reason) => reasons.push(reason),
                Err(payload) => {
                    let info = PanicInfo::from_payload(payload);
                    first_panic.get_or_insert_with(|| {
                        Error::worker_panic(format!(
                            "worker {} of {} panicked: {}",
                            worker.id, self.name, info.message
                        ))
                    });
                }
            }
        }

        match first_panic {
            Some(err) => Err(err),
            None => Ok(reasons),
        }
    }
}

impl fmt::Display for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("workers", &self.workers.len())
            .field("live", &self.live_workers())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
