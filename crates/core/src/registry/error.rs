//! Error types for the task registry.

use thiserror::Error;

use super::types::TaskState;
use crate::install::InstallError;
use crate::store::StoreError;

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No task exists for the item.
    #[error("No task for item {0}")]
    TaskNotFound(String),

    /// The operation is not valid from the task's current state.
    #[error("Cannot {operation} item {item_id} while {state}")]
    InvalidStateTransition {
        item_id: String,
        operation: &'static str,
        state: TaskState,
    },

    /// Another install of the same artifact is in progress.
    #[error("Install already in progress for item {0}")]
    InstallInProgress(String),

    /// Deleting or promoting the artifact failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// The install bridge reported an error.
    #[error("Install failed: {0}")]
    Install(#[from] InstallError),
}

impl RegistryError {
    pub(crate) fn invalid(item_id: &str, operation: &'static str, state: TaskState) -> Self {
        Self::InvalidStateTransition {
            item_id: item_id.to_string(),
            operation,
            state,
        }
    }
}
