//! Notification bridge: surfaces download state outside the foreground UI.

use serde::Serialize;
use tracing::info;

use crate::registry::{Task, TaskState};

/// What a notification shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub item_id: String,
    pub title: String,
    pub state: TaskState,
}

impl NotificationPayload {
    pub fn from_task(task: &Task) -> Self {
        Self {
            item_id: task.item_id.clone(),
            title: task.title.clone(),
            state: task.state,
        }
    }
}

/// Delivers notifications to the platform.
///
/// Called while the registry holds its task lock, so implementations must
/// return immediately; hand slow work to a channel or task.
pub trait NotificationBridge: Send + Sync {
    fn notify(&self, payload: NotificationPayload);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationBridge for LogNotifier {
    fn notify(&self, payload: NotificationPayload) {
        info!(
            item_id = %payload.item_id,
            state = payload.state.as_str(),
            "{}: {}",
            payload.title,
            headline(payload.state)
        );
    }
}

/// Short human readable text for a state.
pub fn headline(state: TaskState) -> &'static str {
    match state {
        TaskState::Queued => "Waiting to download",
        TaskState::Running => "Downloading",
        TaskState::ReadyToInstall => "Ready to install",
        TaskState::Cancelled => "Download cancelled",
        TaskState::Failed => "Download failed",
        TaskState::CleanupPending => "Installed",
    }
}
