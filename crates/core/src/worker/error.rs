//! Error types for download workers.

use thiserror::Error;

use crate::registry::{FailureKind, TaskError};
use crate::store::StoreError;

/// Errors that end a download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Connection, timeout or stream failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status or a malformed body.
    #[error("Server error ({status}): {detail}")]
    Server { status: u16, detail: String },

    /// Writing the artifact failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// The caller cancelled the download.
    #[error("Download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Taxonomy tag for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            DownloadError::Network(_) => FailureKind::NetworkError,
            DownloadError::Server { .. } => FailureKind::ServerError,
            DownloadError::Storage(_) => FailureKind::StorageError,
            DownloadError::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Whether this is a caller-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }

    /// Human readable detail, without the taxonomy prefix.
    pub fn detail(&self) -> String {
        match self {
            DownloadError::Network(msg) => msg.clone(),
            DownloadError::Server { status, detail } => format!("HTTP {}: {}", status, detail),
            DownloadError::Storage(e) => e.detail(),
            DownloadError::Cancelled => "cancelled by caller".to_string(),
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => DownloadError::Server {
                status: status.as_u16(),
                detail: error.to_string(),
            },
            None => DownloadError::Network(error.to_string()),
        }
    }
}

impl From<&DownloadError> for TaskError {
    fn from(error: &DownloadError) -> Self {
        TaskError::new(error.kind(), error.detail())
    }
}
