//! Error types for install bridges.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when handing an artifact to the platform.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The artifact file is gone.
    #[error("Artifact not found: {path}")]
    ArtifactMissing { path: PathBuf },

    /// The installer program could not be found.
    #[error("Installer not found: {program}")]
    ProgramNotFound { program: String },

    /// The installer needs a package identifier and none was given.
    #[error("Installer requires a package name")]
    MissingPackage,

    /// The installer ran and reported failure.
    #[error("Installer failed: {reason}")]
    Failed {
        reason: String,
        stderr: Option<String>,
    },

    /// The bridge does not implement this operation.
    #[error("Operation not supported by this installer: {0}")]
    Unsupported(&'static str),

    /// I/O error while running the installer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallError {
    /// Creates a failure error with captured stderr.
    pub fn failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            stderr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = InstallError::failed("exit code 1", Some("INSTALL_FAILED_OLDER_SDK".into()));
        assert_eq!(err.to_string(), "Installer failed: exit code 1");
        assert_eq!(
            InstallError::Unsupported("launch").to_string(),
            "Operation not supported by this installer: launch"
        );
    }
}
