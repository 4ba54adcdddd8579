//! Notification bridge that records payloads.

use std::sync::Mutex;

use crate::notify::{NotificationBridge, NotificationPayload};
use crate::registry::TaskState;

/// Collects notifications for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    payloads: Mutex<Vec<NotificationPayload>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications received so far.
    pub fn payloads(&self) -> Vec<NotificationPayload> {
        self.payloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// States notified for one item, in order.
    pub fn states_for(&self, item_id: &str) -> Vec<TaskState> {
        self.payloads()
            .into_iter()
            .filter(|p| p.item_id == item_id)
            .map(|p| p.state)
            .collect()
    }
}

impl NotificationBridge for RecordingNotifier {
    fn notify(&self, payload: NotificationPayload) {
        self.payloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(payload);
    }
}
