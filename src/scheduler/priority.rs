use super::Sourcer;
use crate::cancel::CancelSignal;
use crate::executor::{BoxedTask, Task};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;

/// A task paired with an integer priority. Higher priorities are delivered
/// first.
///
/// Two priority tasks are never compared for equality; each is its own
/// identity.
pub struct PriorityTask {
    task: BoxedTask,
    priority: i32,
}

impl PriorityTask {
    pub fn new<T: Task + 'static>(task: T, priority: i32) -> Self {
        Self::from_boxed(Box::new(task), priority)
    }

    pub fn from_boxed(task: BoxedTask, priority: i32) -> Self {
        Self { task, priority }
    }

    /// Unwrap the inner task.
    pub fn into_inner(self) -> BoxedTask {
        self.task
    }
}

impl Task for PriorityTask {
    fn run(&self, cancel: &CancelSignal) {
        self.task.run(cancel);
    }

    fn priority(&self) -> Option<i32> {
        Some(self.priority)
    }
}

impl fmt::Display for PriorityTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.task, f)
    }
}

impl fmt::Debug for PriorityTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityTask")
            .field("task", &self.task.to_string())
            .field("priority", &self.priority)
            .finish()
    }
}

// Heap slot. Ordered by priority alone; ties fall wherever the heap puts them.
struct Entry {
    priority: i32,
    task: BoxedTask,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority.cmp(&other.priority)
    }
}

/// Max-heap [`Sourcer`] keyed on task priority.
///
/// Tasks without a priority are stored as priority 0. Order among equal
/// priorities is not FIFO; it follows the heap's sift mechanics and is
/// deterministic for a given sequence of operations. Depth is unbounded.
pub struct PriorityQueue {
    name: String,
    heap: BinaryHeap<Entry>,
}

impl PriorityQueue {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            heap: BinaryHeap::new(),
        }
    }

    pub fn with_capacity<S: Into<String>>(name: S, capacity: usize) -> Self {
        Self {
            name: name.into(),
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Add a task with an explicit priority.
    pub fn push<T: Task + 'static>(&mut self, task: T, priority: i32) {
        self.add(Box::new(PriorityTask::new(task, priority)));
    }

    /// Priority of the task `next` would return.
    pub fn peek_priority(&self) -> Option<i32> {
        self.heap.peek().map(|e| e.priority)
    }
}

impl Sourcer for PriorityQueue {
    fn next(&mut self) -> Option<BoxedTask> {
        self.heap.pop().map(|e| e.task)
    }

    fn add(&mut self, task: BoxedTask) {
        let (priority, task) = match task.priority() {
            Some(p) => (p, task),
            None => (0, Box::new(PriorityTask::from_boxed(task, 0)) as BoxedTask),
        };
        self.heap.push(Entry { priority, task });
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

impl fmt::Display for PriorityQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for PriorityQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("name", &self.name)
            .field("len", &self.heap.len())
            .field("top", &self.peek_priority())
            .finish()
    }
}
