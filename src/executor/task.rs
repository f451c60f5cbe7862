//! Task representation and execution.

use crate::cancel::CancelSignal;
use std::fmt;

/// A unit of work run by a pool worker.
///
/// `Display` supplies the label used in log lines. `run` executes
/// synchronously on the worker thread and receives the pool's cancellation
/// signal; long-running work should check it (or sleep through
/// [`CancelSignal::wait_timeout`]) and return promptly once it fires.
///
/// A task reports its own failures. The pool neither retries nor interprets
/// what happened inside `run`.
pub trait Task: fmt::Display + Send {
    fn run(&self, cancel: &CancelSignal);

    /// Scheduling priority, if this task carries one. Higher runs first.
    fn priority(&self) -> Option<i32> {
        None
    }
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("label", &self.to_string())
            .field("priority", &self.priority())
            .finish()
    }
}

/// An owned, type-erased task. Exactly one component holds it at a time.
pub type BoxedTask = Box<dyn Task>;

/// Task built from a label and a closure.
pub struct FnTask<F> {
    label: String,
    func: F,
}

impl<F> FnTask<F>
where
    F: Fn(&CancelSignal) + Send,
{
    pub fn new<S: Into<String>>(label: S, func: F) -> Self {
        Self {
            label: label.into(),
            func,
        }
    }
}

impl<F> Task for FnTask<F>
where
    F: Fn(&CancelSignal) + Send,
{
    fn run(&self, cancel: &CancelSignal) {
        (self.func)(cancel);
    }
}

impl<F> fmt::Display for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").field("label", &self.label).finish()
    }
}

/// Shorthand for [`FnTask::new`].
pub fn task_fn<S, F>(label: S, func: F) -> FnTask<F>
where
    S: Into<String>,
    F: Fn(&CancelSignal) + Send,
{
    FnTask::new(label, func)
}
