//! sourcepool - fixed-size worker pools fed by a single-owner task source.
//!
//! Two pieces, usable together or apart:
//!
//! - [`WorkerPool`]: N threads that take tasks from one inbound hand-off
//!   point and run them until a shared [`CancelSignal`] fires or the point
//!   is closed.
//! - [`ManagedSource`]: one thread that exclusively owns a [`Sourcer`] (a
//!   plain, non-thread-safe container such as [`PriorityQueue`]) and
//!   exposes it through an add point and an outbound point.
//!
//! # Quick Start
//!
//! ```no_run
//! use sourcepool::prelude::*;
//!
//! let cancel = CancelSignal::new();
//! let source = ManagedSource::new(PriorityQueue::new("jobs"), false, None, cancel.clone())?;
//! let mut pool = WorkerPool::new("workers", 4, false, cancel.clone(), source.source())?;
//!
//! source.add(PriorityTask::new(task_fn("urgent", |_: &CancelSignal| {}), 10))?;
//! source.add(task_fn("whenever", |_: &CancelSignal| {}))?;
//!
//! cancel.cancel();
//! pool.wait()?;
//! let leftover = source.wait()?;
//! println!("{} tasks left in {}", leftover.len(), leftover);
//! # Ok::<(), sourcepool::Error>(())
//! ```
//!
//! All hand-off points are unbuffered, so producers are throttled to the
//! rate at which workers take tasks. Cancellation never drops a task the
//! source accepted: the one task a source may be holding for delivery goes
//! back into its sourcer, and [`ManagedSource::wait`] returns the sourcer.

#![warn(missing_debug_implementations)]

pub mod cancel;
pub mod channel;
pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod runtime;
pub mod scheduler;
pub mod telemetry;

pub use cancel::CancelSignal;
pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{Error, Result};
pub use executor::{task_fn, BoxedTask, FnTask, PanicStrategy, StopReason, Task, WorkerPool};
pub use runtime::{Runtime, RuntimeBuilder};
pub use scheduler::{FifoQueue, ManagedSource, PriorityQueue, PriorityTask, Sourcer};
