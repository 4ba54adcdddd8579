//! Error types for the artifact store.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading or writing artifacts.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to create the artifact directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or write a temporary file.
    #[error("Failed to write {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to rename a temporary file to its final path.
    #[error("Failed to promote {temp_path} to {final_path}")]
    PromoteFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to delete an artifact.
    #[error("Failed to delete {path}")]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The device holding the artifact directory is full.
    #[error("Insufficient disk space at {path}")]
    InsufficientSpace { path: PathBuf },

    /// Permission denied.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Creates a write error, classifying disk-full and permission failures.
    pub fn write_failed(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::StorageFull => Self::InsufficientSpace {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::WriteFailed {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Creates a promote error.
    pub fn promote_failed(temp_path: &Path, final_path: &Path, error: std::io::Error) -> Self {
        Self::PromoteFailed {
            temp_path: temp_path.to_path_buf(),
            final_path: final_path.to_path_buf(),
            error,
        }
    }

    /// Human readable detail including the underlying I/O cause.
    pub fn detail(&self) -> String {
        match std::error::Error::source(self) {
            Some(cause) => format!("{}: {}", self, cause),
            None => self.to_string(),
        }
    }
}
