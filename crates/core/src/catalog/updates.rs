//! Available-updates view over the catalog.

use std::collections::HashMap;

use super::types::CatalogEntry;
use crate::registry::{Task, TaskState};
use crate::version::UpdateStatus;

/// Installed-app collaborator.
pub trait InstalledApps: Send + Sync {
    /// Installed version of an item, `None` when it is not installed.
    fn installed_version(&self, item_id: &str) -> Option<String>;
}

/// Installed versions held in memory, keyed by item id.
#[derive(Debug, Clone, Default)]
pub struct StaticInstalledApps {
    versions: HashMap<String, String>,
}

impl StaticInstalledApps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, item_id: impl Into<String>, version: impl Into<String>) -> Self {
        self.insert(item_id, version);
        self
    }

    pub fn insert(&mut self, item_id: impl Into<String>, version: impl Into<String>) {
        self.versions.insert(item_id.into(), version.into());
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl From<HashMap<String, String>> for StaticInstalledApps {
    fn from(versions: HashMap<String, String>) -> Self {
        Self { versions }
    }
}

impl InstalledApps for StaticInstalledApps {
    fn installed_version(&self, item_id: &str) -> Option<String> {
        self.versions.get(item_id).cloned()
    }
}

/// Entries with an update available that nothing is already handling.
///
/// Keeps catalog order. An entry is skipped while its item has a task that
/// is active, ready or awaiting cleanup; cancelled and failed tasks do not
/// hide an update.
pub fn available_updates<'a>(
    entries: &'a [CatalogEntry],
    installed: &dyn InstalledApps,
    tasks: &[Task],
) -> Vec<&'a CatalogEntry> {
    entries
        .iter()
        .filter(|entry| {
            let version = installed.installed_version(&entry.item_id);
            entry.update_status(version.as_deref()) == UpdateStatus::UpdateAvailable
        })
        .filter(|entry| {
            !tasks.iter().any(|task| {
                task.item_id == entry.item_id
                    && matches!(
                        task.state,
                        TaskState::Queued
                            | TaskState::Running
                            | TaskState::ReadyToInstall
                            | TaskState::CleanupPending
                    )
            })
        })
        .collect()
}
