//! Hand-off points.
//!
//! Every point between producers, the managed source and the workers is a
//! zero-capacity channel: a send completes only once a receiver takes the
//! value, which is the pool's only back-pressure.

pub use crossbeam_channel::{Receiver, Sender};

/// Create an unbuffered hand-off point.
pub fn hand_off<T>() -> (Sender<T>, Receiver<T>) {
    crossbeam_channel::bounded(0)
}

/// Create a wake-up point for a managed source.
///
/// Sending on it makes the source thread ask its sourcer for work again.
/// Dropping every sender disables the branch without stopping the source.
pub fn wakeup_point() -> (Sender<()>, Receiver<()>) {
    hand_off()
}
