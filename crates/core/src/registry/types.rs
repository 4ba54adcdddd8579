//! Task model and update events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle state of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created, waiting for a worker slot.
    Queued,
    /// A worker is streaming the artifact.
    Running,
    /// The artifact is complete and promoted.
    ReadyToInstall,
    /// Cancelled by the caller.
    Cancelled,
    /// The attempt failed; see the task error.
    Failed,
    /// Installed; waiting for a decision about the artifact file.
    CleanupPending,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::ReadyToInstall => "ready_to_install",
            TaskState::Cancelled => "cancelled",
            TaskState::Failed => "failed",
            TaskState::CleanupPending => "cleanup_pending",
        }
    }

    /// Queued or running. At most one active task exists per item.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskState::Queued | TaskState::Running)
    }

    /// A promoted artifact exists for this state.
    pub fn has_artifact(&self) -> bool {
        matches!(self, TaskState::ReadyToInstall | TaskState::CleanupPending)
    }

    /// Cancelled or failed. The task only leaves this state by being replaced or dismissed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Cancelled | TaskState::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NetworkError,
    ServerError,
    StorageError,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NetworkError => "network_error",
            FailureKind::ServerError => "server_error",
            FailureKind::StorageError => "storage_error",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

/// Why a task failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: FailureKind,
    pub detail: String,
}

impl TaskError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Snapshot of one download attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique id of this attempt.
    pub task_id: String,
    /// Catalog item the task belongs to.
    pub item_id: String,
    /// Display title used for notifications.
    pub title: String,
    /// Resolved download URL.
    pub source_url: String,
    pub state: TaskState,
    /// Advertised size, if known.
    pub bytes_total: Option<u64>,
    pub bytes_received: u64,
    /// 0..=100; `None` while the size is unknown.
    pub progress_percent: Option<u8>,
    /// Set for `ReadyToInstall` and `CleanupPending` only.
    pub artifact_path: Option<PathBuf>,
    /// Set for `Failed` only.
    pub error: Option<TaskError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub(crate) fn new(task_id: String, item_id: String, title: String, source_url: String) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            item_id,
            title,
            source_url,
            state: TaskState::Queued,
            bytes_total: None,
            bytes_received: 0,
            progress_percent: None,
            artifact_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update event describing the current snapshot.
    pub fn to_event(&self) -> TaskEvent {
        TaskEvent::Updated {
            item_id: self.item_id.clone(),
            task_id: self.task_id.clone(),
            state: self.state,
            progress_percent: self.progress_percent,
            bytes_received: self.bytes_received,
            bytes_total: self.bytes_total,
        }
    }
}

/// Running percentage for a byte count. Never reports 100; that value is
/// reserved for the transition to `ReadyToInstall`.
pub(crate) fn running_percent(received: u64, total: Option<u64>) -> Option<u8> {
    match total {
        Some(0) => Some(0),
        Some(total) => {
            let percent = (received.min(total) as u128 * 100 / total as u128) as u8;
            Some(percent.min(99))
        }
        None => None,
    }
}

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was created or changed.
    Updated {
        item_id: String,
        task_id: String,
        state: TaskState,
        progress_percent: Option<u8>,
        bytes_received: u64,
        bytes_total: Option<u64>,
    },
    /// A task left the registry.
    Removed { item_id: String, task_id: String },
}

impl TaskEvent {
    pub fn item_id(&self) -> &str {
        match self {
            TaskEvent::Updated { item_id, .. } | TaskEvent::Removed { item_id, .. } => item_id,
        }
    }
}

/// Request to download an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub item_id: String,
    pub url: String,
    /// Display title; defaults to the item id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl DownloadRequest {
    pub fn new(item_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Serialize)]
pub struct Started {
    pub task: Task,
    /// True when an already active task was returned.
    pub joined: bool,
}

/// Task counts per queue section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub active: usize,
    pub ready: usize,
    pub cleanup_pending: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl QueueSummary {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut summary = Self::default();
        for task in tasks {
            match task.state {
                TaskState::Queued | TaskState::Running => summary.active += 1,
                TaskState::ReadyToInstall => summary.ready += 1,
                TaskState::CleanupPending => summary.cleanup_pending += 1,
                TaskState::Failed => summary.failed += 1,
                TaskState::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.active + self.ready + self.cleanup_pending + self.failed + self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(state: TaskState) -> Task {
        let mut task = Task::new(
            "t".into(),
            "app".into(),
            "App".into(),
            "https://x.test/app.apk".into(),
        );
        task.state = state;
        task
    }

    #[test]
    fn test_state_predicates() {
        assert!(TaskState::Queued.is_active());
        assert!(TaskState::Running.is_active());
        assert!(!TaskState::ReadyToInstall.is_active());
        assert!(TaskState::ReadyToInstall.has_artifact());
        assert!(TaskState::CleanupPending.has_artifact());
        assert!(!TaskState::Failed.has_artifact());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskState::ReadyToInstall).unwrap(),
            "\"ready_to_install\""
        );
        assert_eq!(TaskState::CleanupPending.to_string(), "cleanup_pending");
        assert_eq!(
            serde_json::to_string(&FailureKind::NetworkError).unwrap(),
            "\"network_error\""
        );
    }

    #[test]
    fn test_running_percent() {
        assert_eq!(running_percent(0, Some(1000)), Some(0));
        assert_eq!(running_percent(500, Some(1000)), Some(50));
        assert_eq!(running_percent(1000, Some(1000)), Some(99));
        assert_eq!(running_percent(5000, Some(1000)), Some(99));
        assert_eq!(running_percent(10, None), None);
        assert_eq!(running_percent(0, Some(0)), Some(0));
    }

    #[test]
    fn test_event_serialization() {
        let event = task(TaskState::Running).to_event();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "updated");
        assert_eq!(json["item_id"], "app");
        assert_eq!(json["state"], "running");

        let removed = TaskEvent::Removed {
            item_id: "app".into(),
            task_id: "t".into(),
        };
        assert_eq!(removed.item_id(), "app");
        assert_eq!(serde_json::to_value(&removed).unwrap()["type"], "removed");
    }

    #[test]
    fn test_queue_summary() {
        let tasks = vec![
            task(TaskState::Queued),
            task(TaskState::Running),
            task(TaskState::ReadyToInstall),
            task(TaskState::Failed),
            task(TaskState::Failed),
            task(TaskState::CleanupPending),
        ];
        let summary = QueueSummary::from_tasks(&tasks);
        assert_eq!(summary.active, 2);
        assert_eq!(summary.ready, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.cleanup_pending, 1);
        assert_eq!(summary.cancelled, 0);
        assert_eq!(summary.total(), 6);
    }

    #[test]
    fn test_download_request_deserialize() {
        let req: DownloadRequest =
            serde_json::from_str(r#"{"item_id":"app","url":"https://x.test/a.apk"}"#).unwrap();
        assert!(req.title.is_none());
        let req = req.with_title("App");
        assert_eq!(req.title.as_deref(), Some("App"));
    }
}
