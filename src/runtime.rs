use crate::cancel::CancelSignal;
use crate::channel::{wakeup_point, Sender};
use crate::config::PoolConfig;
use crate::error::Result;
use crate::executor::{BoxedTask, StopReason, Task, WorkerPool};
use crate::scheduler::{ManagedSource, PriorityTask, Sourcer};
use crate::telemetry::{default_logger, MetricsSnapshot, SharedLogger};

/// A managed source wired to a worker pool under one cancellation signal.
///
/// ```no_run
/// use sourcepool::prelude::*;
///
/// let config = PoolConfig::builder().name("jobs").num_threads(4).build()?;
/// let runtime = Runtime::builder(PriorityQueue::new("jobs")).config(config).start()?;
///
/// runtime.submit_with_priority(task_fn("reindex", |_: &CancelSignal| {}), 10)?;
/// let leftover = runtime.shutdown()?;
/// println!("{} tasks never ran", leftover.len());
/// # Ok::<(), sourcepool::Error>(())
/// ```
pub struct Runtime<S> {
    source: ManagedSource<S>,
    pool: WorkerPool,
    cancel: CancelSignal,
    wakeup: Sender<()>,
}

impl<S: Sourcer + 'static> Runtime<S> {
    pub fn builder(sourcer: S) -> RuntimeBuilder<S> {
        RuntimeBuilder::new(sourcer)
    }

    /// Submit a task, blocking until the source thread accepts it.
    pub fn submit<T: Task + 'static>(&self, task: T) -> Result<()> {
        self.source.add(task)
    }

    pub fn submit_boxed(&self, task: BoxedTask) -> Result<()> {
        self.source.add_boxed(task)
    }

    pub fn submit_with_priority<T: Task + 'static>(&self, task: T, priority: i32) -> Result<()> {
        self.source.add(PriorityTask::new(task, priority))
    }

    /// Make the source thread ask its sourcer for work again.
    pub fn wake(&self) {
        // Fails only once the source thread is gone.
        let _ = self.wakeup.send(());
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.pool.metrics()
    }

    pub fn tasks_completed(&self) -> u64 {
        self.pool.tasks_completed()
    }

    /// Cancel, wait for every worker, then wait for the source and return
    /// its sourcer with whatever was never delivered.
    pub fn shutdown(mut self) -> Result<S> {
        self.cancel.cancel();
        let pool_result = self.pool.wait();
        let sourcer = self.source.wait()?;
        pool_result?;
        Ok(sourcer)
    }

    /// Like [`shutdown`](Self::shutdown), but also reports why each worker stopped.
    pub fn shutdown_with_reasons(mut self) -> Result<(S, Vec<StopReason>)> {
        self.cancel.cancel();
        let pool_result = self.pool.wait();
        let sourcer = self.source.wait()?;
        Ok((sourcer, pool_result?))
    }
}

impl<S> std::fmt::Debug for Runtime<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("source", &self.source.name())
            .field("pool", &self.pool)
            .finish()
    }
}

pub struct RuntimeBuilder<S> {
    sourcer: S,
    config: PoolConfig,
    logger: SharedLogger,
    parent: Option<CancelSignal>,
}

impl<S> std::fmt::Debug for RuntimeBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("config", &self.config)
            .field("parent", &self.parent)
            .finish()
    }
}

impl<S: Sourcer + 'static> RuntimeBuilder<S> {
    pub fn new(sourcer: S) -> Self {
        Self {
            sourcer,
            config: PoolConfig::default(),
            logger: default_logger(),
            parent: None,
        }
    }

    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Tie the runtime to an outer signal. The runtime gets a child of it,
    /// so shutting the runtime down leaves `parent` untouched.
    pub fn parent(mut self, parent: CancelSignal) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn start(self) -> Result<Runtime<S>> {
        self.config.validate()?;

        let cancel = match &self.parent {
            Some(parent) => parent.child(),
            None => CancelSignal::new(),
        };
        let (wakeup, wakeup_rx) = wakeup_point();

        let source = ManagedSource::with_logger(
            self.sourcer,
            self.config.verbose,
            Some(wakeup_rx),
            cancel.clone(),
            self.logger.clone(),
        )?;

        let pool = match WorkerPool::with_logger(
            &self.config,
            cancel.clone(),
            source.source(),
            self.logger,
        ) {
            Ok(pool) => pool,
            Err(e) => {
                cancel.cancel();
                let _ = source.wait();
                return Err(e);
            }
        };

        Ok(Runtime {
            source,
            pool,
            cancel,
            wakeup,
        })
    }
}
