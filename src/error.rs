use crate::executor::BoxedTask;
use parking_lot::Mutex;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    /// The managed source thread had already stopped. The task is handed
    /// back; see [`Error::into_task`].
    #[error("source {name} has stopped accepting tasks")]
    SourceStopped { name: String, task: Mutex<BoxedTask> },

    /// `close_add` was called on this handle.
    #[error("add point of source {name} was closed")]
    AddClosed { name: String, task: Mutex<BoxedTask> },

    #[error("worker panic: {0}")]
    WorkerPanic(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn worker_panic<S: Into<String>>(msg: S) -> Self {
        Error::WorkerPanic(msg.into())
    }

    pub(crate) fn source_stopped(name: &str, task: BoxedTask) -> Self {
        Error::SourceStopped {
            name: name.to_string(),
            task: Mutex::new(task),
        }
    }

    pub(crate) fn add_closed(name: &str, task: BoxedTask) -> Self {
        Error::AddClosed {
            name: name.to_string(),
            task: Mutex::new(task),
        }
    }

    /// Take back the task a source refused, so it can be resubmitted elsewhere.
    pub fn into_task(self) -> Option<BoxedTask> {
        match self {
            Error::SourceStopped { task, .. } | Error::AddClosed { task, .. } => {
                Some(task.into_inner())
            }
            _ => None,
        }
    }
}
