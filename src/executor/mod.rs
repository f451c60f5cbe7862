//! Task execution infrastructure.
//!
//! This module provides the task contract, the worker loop and the
//! fixed-size worker pool.

pub mod panic_handler;
pub mod pool;
pub mod task;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicStrategy};
pub use pool::WorkerPool;
pub use task::{task_fn, BoxedTask, FnTask, Task};
pub use worker::{StopReason, WorkerId};
