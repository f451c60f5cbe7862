//! Single-owner thread around a [`Sourcer`].
//!
//! The managed thread is the only code that ever touches the sourcer. Each
//! iteration it makes sure it holds the next task (if any), then blocks in a
//! single multi-way select over:
//!
//! - the cancellation signal, which ends the thread,
//! - the wake-up point, which just forces another pull from the sourcer,
//! - the add point, whose tasks go straight into the sourcer,
//! - the outbound point, offered only while a task is held.
//!
//! A closed wake-up or add point drops out of the select for good; it never
//! stops the thread. On cancellation a held task goes back into the sourcer,
//! so nothing that was accepted on the add point is lost.
//!
//! The outbound point stays open until the handle is waited on or dropped,
//! so consumers never mistake a stopped source for a closed one.

use super::Sourcer;
use crate::cancel::CancelSignal;
use crate::channel::{hand_off, Receiver, Sender};
use crate::error::{Error, Result};
use crate::executor::panic_handler::PanicInfo;
use crate::executor::{BoxedTask, Task};
use crate::telemetry::{default_logger, LogLevel, SharedLogger};
use crossbeam_channel::{Select, SendError};
use std::thread::{self, JoinHandle};

/// A [`Sourcer`] running on its own thread, fed and drained through
/// unbuffered hand-off points.
///
/// The thread lives until the cancellation signal fires. [`wait`] joins it
/// and hands the sourcer back, including any task that was pulled but never
/// delivered.
///
/// [`wait`]: ManagedSource::wait
#[derive(Debug)]
pub struct ManagedSource<S> {
    name: String,
    source: Receiver<BoxedTask>,
    // Keeps the outbound point connected after the thread exits.
    _outbound: Sender<BoxedTask>,
    add: Option<Sender<BoxedTask>>,
    thread: JoinHandle<S>,
}

impl<S: Sourcer + 'static> ManagedSource<S> {
    /// Start a managed source that logs through `tracing`.
    ///
    /// `wakeup` is optional; pass a receiver from
    /// [`wakeup_point`](crate::channel::wakeup_point) if producers can fill the
    /// sourcer through some side channel. With `verbose`, every delivery,
    /// addition and state change is logged at debug level.
    pub fn new(
        sourcer: S,
        verbose: bool,
        wakeup: Option<Receiver<()>>,
        cancel: CancelSignal,
    ) -> Result<Self> {
        Self::with_logger(sourcer, verbose, wakeup, cancel, default_logger())
    }

    pub fn with_logger(
        sourcer: S,
        verbose: bool,
        wakeup: Option<Receiver<()>>,
        cancel: CancelSignal,
        logger: SharedLogger,
    ) -> Result<Self> {
        let name = sourcer.to_string();
        let (source_tx, source_rx) = hand_off();
        let (add_tx, add_rx) = hand_off();

        let state = SourceLoop {
            component: format!("source {}", name),
            sourcer,
            verbose,
            logger,
            cancel,
            wakeup,
            add: Some(add_rx),
            outbound: Some(source_tx.clone()),
            held: None,
        };

        let thread = thread::Builder::new()
            .name(format!("source-{}", name))
            .spawn(move || state.run())
            .map_err(|e| Error::executor(format!("failed to spawn source {}: {}", name, e)))?;

        Ok(Self {
            name,
            source: source_rx,
            _outbound: source_tx,
            add: Some(add_tx),
            thread,
        })
    }
}

impl<S> ManagedSource<S> {
    /// Name of the wrapped sourcer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The outbound point. Hand this to a [`WorkerPool`](crate::WorkerPool).
    pub fn source(&self) -> Receiver<BoxedTask> {
        self.source.clone()
    }

    /// A sender on the add point, or `None` after [`close_add`](Self::close_add).
    pub fn add_point(&self) -> Option<Sender<BoxedTask>> {
        self.add.clone()
    }

    /// Submit a task, blocking until the managed thread accepts it.
    ///
    /// Fails once the thread has stopped or after [`close_add`](Self::close_add);
    /// the error carries the task back ([`Error::into_task`]).
    pub fn add<T: Task + 'static>(&self, task: T) -> Result<()> {
        self.add_boxed(Box::new(task))
    }

    pub fn add_boxed(&self, task: BoxedTask) -> Result<()> {
        let Some(add) = self.add.as_ref() else {
            return Err(Error::add_closed(&self.name, task));
        };
        add.send(task)
            .map_err(|SendError(task)| Error::source_stopped(&self.name, task))
    }

    /// Drop this handle's add sender. The add branch closes once every
    /// sender from [`add_point`](Self::add_point) is gone too.
    pub fn close_add(&mut self) {
        self.add = None;
    }

    /// Whether the managed thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the managed thread stops, then return the sourcer.
    ///
    /// Never returns if the cancellation signal never fires.
    pub fn wait(self) -> Result<S> {
        self.thread.join().map_err(|payload| {
            let info = PanicInfo::from_payload(payload);
            Error::worker_panic(format!("source {} panicked: {}", self.name, info.message))
        })
    }
}

#[derive(Clone, Copy)]
enum Branch<'a> {
    Cancel,
    Wakeup(&'a Receiver<()>),
    Add(&'a Receiver<BoxedTask>),
    Deliver(&'a Sender<BoxedTask>),
}

enum Event {
    Cancelled,
    Woken,
    WakeupClosed,
    Added(BoxedTask),
    AddClosed,
    Delivered(Option<String>),
    ConsumersGone,
}

struct SourceLoop<S> {
    component: String,
    sourcer: S,
    verbose: bool,
    logger: SharedLogger,
    cancel: CancelSignal,
    wakeup: Option<Receiver<()>>,
    add: Option<Receiver<BoxedTask>>,
    outbound: Option<Sender<BoxedTask>>,
    // Pulled from the sourcer, not yet taken by a consumer. At most one.
    held: Option<BoxedTask>,
}

impl<S: Sourcer> SourceLoop<S> {
    fn run(mut self) -> S {
        loop {
            if self.held.is_none() {
                self.held = self.sourcer.next();
                if self.held.is_none() {
                    self.debug(|| "no task available, none will be sent".to_string());
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            match self.select() {
                Event::Cancelled => break,
                Event::Woken => self.debug(|| "got a wakeup signal".to_string()),
                Event::WakeupClosed => {
                    self.wakeup = None;
                    self.debug(|| "wakeup closed, no longer selecting on it".to_string());
                }
                Event::Added(task) => {
                    let label = self.verbose.then(|| task.to_string());
                    self.sourcer.add(task);
                    if let Some(label) = label {
                        self.debug(|| format!("added task {}", label));
                    }
                }
                Event::AddClosed => {
                    self.add = None;
                    self.debug(|| "add closed, no longer selecting on it".to_string());
                }
                Event::Delivered(label) => {
                    if let Some(label) = label {
                        self.debug(|| format!("sent task {}", label));
                    }
                }
                Event::ConsumersGone => {
                    self.outbound = None;
                    self.logger.log(
                        LogLevel::Warn,
                        &self.component,
                        "outbound point has no consumers left, holding tasks until stop",
                    );
                }
            }
        }

        self.stop();
        self.sourcer
    }

    fn select(&mut self) -> Event {
        let verbose = self.verbose;
        let Self {
            cancel,
            wakeup,
            add,
            outbound,
            held,
            ..
        } = self;

        let mut sel = Select::new();
        let mut branches = Vec::with_capacity(4);

        sel.recv(cancel.receiver());
        branches.push(Branch::Cancel);
        if let Some(rx) = wakeup.as_ref() {
            sel.recv(rx);
            branches.push(Branch::Wakeup(rx));
        }
        if let Some(rx) = add.as_ref() {
            sel.recv(rx);
            branches.push(Branch::Add(rx));
        }
        if held.is_some() {
            if let Some(tx) = outbound.as_ref() {
                sel.send(tx);
                branches.push(Branch::Deliver(tx));
            }
        }

        let oper = sel.select();
        match branches[oper.index()] {
            Branch::Cancel => {
                let _ = oper.recv(cancel.receiver());
                Event::Cancelled
            }
            Branch::Wakeup(rx) => match oper.recv(rx) {
                Ok(()) => Event::Woken,
                Err(_) => Event::WakeupClosed,
            },
            Branch::Add(rx) => match oper.recv(rx) {
                Ok(task) => Event::Added(task),
                Err(_) => Event::AddClosed,
            },
            Branch::Deliver(tx) => match held.take() {
                Some(task) => {
                    let label = verbose.then(|| task.to_string());
                    match oper.send(tx, task) {
                        Ok(()) => Event::Delivered(label),
                        Err(SendError(task)) => {
                            *held = Some(task);
                            Event::ConsumersGone
                        }
                    }
                }
                None => unreachable!("delivery is only offered while a task is held"),
            },
        }
    }

    fn stop(&mut self) {
        self.debug(|| "stop requested".to_string());
        if let Some(task) = self.held.take() {
            let label = self.verbose.then(|| task.to_string());
            self.sourcer.add(task);
            if let Some(label) = label {
                self.debug(|| format!("returned task {} to the source", label));
            }
        }
    }

    fn debug<F: FnOnce() -> String>(&self, message: F) {
        if self.verbose {
            self.logger.log(LogLevel::Debug, &self.component, &message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::wakeup_point;
    use crate::executor::task_fn;
    use crate::scheduler::{FifoQueue, PriorityQueue, PriorityTask};
    use crate::telemetry::MemoryLogger;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn named(label: &str) -> crate::executor::FnTask<impl Fn(&CancelSignal) + Send> {
        task_fn(label, |_: &CancelSignal| {})
    }

    fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn test_held_task_returned_on_cancel() {
        let logger = MemoryLogger::shared();
        let (wake_tx, wake_rx) = wakeup_point();
        let cancel = CancelSignal::new();
        let mut ms = ManagedSource::with_logger(
            PriorityQueue::new("test"),
            true,
            Some(wake_rx),
            cancel.clone(),
            logger.clone(),
        )
        .unwrap();

        // Nothing queued, so nothing is offered.
        assert!(ms.source().try_recv().is_err());

        wake_tx.send(()).unwrap();
        drop(wake_tx);
        assert!(wait_until(|| logger.contains("wakeup closed")));

        ms.add(PriorityTask::new(named("first"), 5)).unwrap();
        ms.add(PriorityTask::new(named("third"), 7)).unwrap();
        ms.add(PriorityTask::new(named("second"), 10)).unwrap();
        ms.close_add();
        assert!(wait_until(|| logger.contains("add closed")));

        // "first" was already held when the others arrived.
        let task = ms.source().recv().unwrap();
        assert_eq!(task.to_string(), "first");

        cancel.cancel();
        let mut queue = ms.wait().unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next().unwrap().to_string(), "second");
        assert_eq!(queue.next().unwrap().to_string(), "third");

        assert!(logger.contains_in_order(&[
            "no task available",
            "got a wakeup signal",
            "wakeup closed",
            "added task first",
            "added task third",
            "added task second",
            "add closed",
            "sent task first",
            "stop requested",
            "returned task second to the source",
        ]));
    }

    #[test]
    fn test_delivery_follows_source_order() {
        let mut queue = FifoQueue::new("fifo");
        for label in ["a", "b", "c"] {
            queue.add(Box::new(named(label)));
        }

        let cancel = CancelSignal::new();
        let ms = ManagedSource::new(queue, false, None, cancel.clone()).unwrap();
        let source = ms.source();
        let got: Vec<String> = (0..3).map(|_| source.recv().unwrap().to_string()).collect();
        assert_eq!(got, ["a", "b", "c"]);

        cancel.cancel();
        assert!(ms.wait().unwrap().is_empty());
    }

    #[test]
    fn test_add_after_stop_fails() {
        let cancel = CancelSignal::new();
        let ms = ManagedSource::new(FifoQueue::new("stopped"), false, None, cancel.clone()).unwrap();

        cancel.cancel();
        assert!(wait_until(|| ms.is_finished()));

        let err = ms.add(named("late")).unwrap_err();
        assert!(matches!(err, Error::SourceStopped { ref name, .. } if name == "stopped"));
        assert_eq!(err.into_task().unwrap().to_string(), "late");
        assert!(ms.wait().unwrap().is_empty());
    }

    #[test]
    fn test_add_after_close_fails() {
        let cancel = CancelSignal::new();
        let mut ms = ManagedSource::new(FifoQueue::new("closed"), false, None, cancel.clone()).unwrap();
        let extra = ms.add_point().unwrap();

        ms.close_add();
        assert!(ms.add_point().is_none());
        let err = ms.add(named("x")).unwrap_err();
        assert!(matches!(err, Error::AddClosed { .. }));
        assert_eq!(err.into_task().unwrap().to_string(), "x");

        // Other senders still reach the thread.
        extra.send(Box::new(named("via clone"))).unwrap();
        assert_eq!(ms.source().recv().unwrap().to_string(), "via clone");

        cancel.cancel();
        ms.wait().unwrap();
    }

    #[test]
    fn test_closed_branches_do_not_stop_thread() {
        let logger = MemoryLogger::shared();
        let (wake_tx, wake_rx) = wakeup_point();
        let cancel = CancelSignal::new();
        let mut ms = ManagedSource::with_logger(
            FifoQueue::new("q"),
            true,
            Some(wake_rx),
            cancel.clone(),
            logger.clone(),
        )
        .unwrap();

        drop(wake_tx);
        ms.close_add();
        assert!(wait_until(|| logger.contains("wakeup closed") && logger.contains("add closed")));

        std::thread::sleep(Duration::from_millis(20));
        assert!(!ms.is_finished());

        cancel.cancel();
        ms.wait().unwrap();
        assert!(logger.contains("stop requested"));
    }

    #[test]
    fn test_quiet_source_logs_nothing() {
        let logger = MemoryLogger::shared();
        let cancel = CancelSignal::new();
        let ms = ManagedSource::with_logger(
            FifoQueue::new("quiet"),
            false,
            None,
            cancel.clone(),
            logger.clone(),
        )
        .unwrap();

        ms.add(named("a")).unwrap();
        ms.source().recv().unwrap();
        cancel.cancel();
        ms.wait().unwrap();

        assert!(logger.records().is_empty());
    }

    #[test]
    fn test_outbound_stays_open_until_wait() {
        let cancel = CancelSignal::new();
        let ms = ManagedSource::new(FifoQueue::new("open"), false, None, cancel.clone()).unwrap();
        let outbound = ms.source();

        cancel.cancel();
        assert!(wait_until(|| ms.is_finished()));
        assert!(matches!(
            outbound.recv_timeout(Duration::from_millis(20)),
            Err(crossbeam_channel::RecvTimeoutError::Timeout)
        ));

        ms.wait().unwrap();
        assert!(outbound.recv().is_err());
    }

    #[test]
    fn test_consumers_gone_keeps_tasks() {
        let logger = MemoryLogger::shared();
        let cancel = CancelSignal::new();
        let mut queue = FifoQueue::new("orphan");
        queue.add(Box::new(named("kept")));

        let ms = ManagedSource::with_logger(queue, false, None, cancel.clone(), logger.clone())
            .unwrap();
        let ManagedSource { source, thread, .. } = ms;
        drop(source);

        assert!(wait_until(|| logger.contains("no consumers left")));
        cancel.cancel();
        let queue = thread.join().unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_shared_logger_type() {
        let logger: SharedLogger = Arc::new(MemoryLogger::new());
        let cancel = CancelSignal::new();
        cancel.cancel();
        let ms = ManagedSource::with_logger(FifoQueue::new("done"), true, None, cancel, logger)
            .unwrap();
        assert_eq!(ms.name(), "done");
        ms.wait().unwrap();
    }
}
