//! Task sources.
//!
//! A [`Sourcer`] is a plain, single-threaded container of pending tasks. It
//! decides delivery order and nothing else. [`ManagedSource`] gives one
//! sourcer a dedicated thread and exposes it to any number of producers and
//! workers through hand-off points, so the sourcer itself never needs
//! locking.

pub mod fifo;
pub mod managed;
pub mod priority;

pub use fifo::FifoQueue;
pub use managed::ManagedSource;
pub use priority::{PriorityQueue, PriorityTask};

use crate::executor::BoxedTask;
use std::fmt;

/// A pluggable container of pending tasks.
///
/// Neither method may block. Implementations need no internal
/// synchronization: a managed source calls them from its own thread only.
/// `Display` names the source in log lines.
pub trait Sourcer: fmt::Display + Send {
    /// Take the next task to deliver, or `None` when there is no work.
    fn next(&mut self) -> Option<BoxedTask>;

    /// Store a task. Also used to take back a task that was pulled but not
    /// delivered before shutdown, so it must keep working until the owning
    /// managed source has stopped.
    fn add(&mut self, task: BoxedTask);

    /// Number of pending tasks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
