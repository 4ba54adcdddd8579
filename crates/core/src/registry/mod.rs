//! Task registry: the orchestration core.
//!
//! The registry owns one [`Task`] per item id and is the only place task
//! state changes. It enforces at most one active (queued or running) task
//! per item, dispatches a [`DownloadWorker`](crate::worker::DownloadWorker)
//! for each new task and republishes progress to subscribers.
//!
//! # State machine
//!
//! ```text
//! Queued -> Running -> ReadyToInstall -> CleanupPending -> (removed)
//!              |              |
//!              |              +-> (removed: redownload / auto cleanup)
//!              +-> Cancelled | Failed -> (replaced by start / dismissed)
//! ```
//!
//! Each attempt carries its own task id. Worker reports are matched on
//! `(item_id, task_id)`, so a cancelled worker that is still winding down can
//! never touch the task that replaced it.

mod config;
mod error;
mod registry;
mod types;

pub use config::DownloadConfig;
pub use error::RegistryError;
pub use registry::TaskRegistry;
pub use types::{
    DownloadRequest, FailureKind, QueueSummary, Started, Task, TaskError, TaskEvent, TaskState,
};
