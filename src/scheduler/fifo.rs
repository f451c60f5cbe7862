use super::Sourcer;
use crate::executor::BoxedTask;
use std::collections::VecDeque;
use std::fmt;

/// First-in first-out [`Sourcer`]. Priorities are ignored.
pub struct FifoQueue {
    name: String,
    queue: VecDeque<BoxedTask>,
}

impl FifoQueue {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            queue: VecDeque::new(),
        }
    }
}

impl Sourcer for FifoQueue {
    fn next(&mut self) -> Option<BoxedTask> {
        self.queue.pop_front()
    }

    fn add(&mut self, task: BoxedTask) {
        self.queue.push_back(task);
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

impl fmt::Display for FifoQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for FifoQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoQueue")
            .field("name", &self.name)
            .field("len", &self.queue.len())
            .finish()
    }
}
