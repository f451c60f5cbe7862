pub use crate::cancel::CancelSignal;
pub use crate::channel::{hand_off, wakeup_point, Receiver, Sender};
pub use crate::config::{PoolConfig, PoolConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{task_fn, BoxedTask, PanicStrategy, StopReason, Task, WorkerPool};
pub use crate::runtime::Runtime;
pub use crate::scheduler::{FifoQueue, ManagedSource, PriorityQueue, PriorityTask, Sourcer};
pub use crate::telemetry::{Logger, MemoryLogger, MetricsSnapshot};
