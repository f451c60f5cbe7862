//! Shared, level-triggered cancellation.
//!
//! A [`CancelSignal`] is handed to every worker, to the managed source thread
//! and to each running task. Firing it is idempotent and never blocks; once
//! fired it stays fired. The signal is backed by a channel whose only sender
//! is dropped on cancel, so its receiver can sit in a `select!` next to the
//! hand-off points and becomes permanently ready the moment the signal fires.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

#[derive(Debug)]
struct Inner {
    fired: AtomicBool,
    // Dropping this sender disconnects `receiver` for every clone.
    trigger: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new() -> Self {
        let (trigger, receiver) = crossbeam_channel::bounded(0);
        Self {
            fired: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            receiver,
            children: Mutex::new(Vec::new()),
        }
    }

    fn fire(&self) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        self.trigger.lock().take();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.fire();
        }
    }
}

/// Cloneable handle to a cancellation signal.
///
/// All clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

impl CancelSignal {
    /// Create a signal that has not fired yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    /// Fire the signal. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.inner.fire();
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Block until the signal fires.
    pub fn wait(&self) {
        // Nothing is ever sent, so this only returns on disconnect.
        let _ = self.inner.receiver.recv();
    }

    /// Block until the signal fires or `timeout` elapses.
    ///
    /// Returns `true` if the signal fired. Long-running tasks use this in
    /// place of a plain sleep so they notice shutdown promptly.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            _ => self.is_cancelled(),
        }
    }

    /// Receiver that becomes ready (disconnected) once the signal fires.
    ///
    /// Meant for `crossbeam_channel::select!`; no value is ever delivered on it.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.inner.receiver
    }

    /// Derive a signal that fires when either it or `self` fires.
    ///
    /// Cancelling the child leaves the parent untouched.
    pub fn child(&self) -> CancelSignal {
        let child = CancelSignal::new();
        {
            let mut children = self.inner.children.lock();
            if !self.is_cancelled() {
                children.retain(|c| c.strong_count() > 0);
                children.push(Arc::downgrade(&child.inner));
                return child;
            }
        }
        child.cancel();
        child
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_cancel_is_level_triggered() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());

        signal.cancel();
        signal.cancel();

        assert!(signal.is_cancelled());
        assert!(signal.receiver().recv().is_err());
        assert!(signal.receiver().recv().is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = CancelSignal::new();
        let other = signal.clone();
        other.cancel();
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_wait_timeout() {
        let signal = CancelSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));

        signal.cancel();
        assert!(signal.wait_timeout(Duration::from_secs(10)));
    }

    #[test]
    fn test_wait_wakes_other_thread() {
        let signal = CancelSignal::new();
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait())
        };

        thread::sleep(Duration::from_millis(10));
        signal.cancel();
        waiter.join().unwrap();
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CancelSignal::new();
        let child = parent.child();
        let grandchild = child.child();

        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_child_does_not_cancel_parent() {
        let parent = CancelSignal::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_child_of_cancelled_parent() {
        let parent = CancelSignal::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }
}
