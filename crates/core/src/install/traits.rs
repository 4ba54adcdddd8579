//! Trait definitions for install bridges.

use async_trait::async_trait;
use std::path::Path;

use super::error::InstallError;

/// Platform service that installs ready artifacts.
///
/// Install, uninstall and launch are keyed by the platform package
/// identifier, which is distinct from the catalog item id.
#[async_trait]
pub trait InstallBridge: Send + Sync {
    /// Returns the name of this bridge implementation.
    fn name(&self) -> &str;

    /// Installs the artifact at `artifact_path`.
    async fn install(
        &self,
        artifact_path: &Path,
        package_name: Option<&str>,
    ) -> Result<(), InstallError>;

    /// Removes an installed package.
    async fn uninstall(&self, _package_name: &str) -> Result<(), InstallError> {
        Err(InstallError::Unsupported("uninstall"))
    }

    /// Starts an installed package.
    async fn launch(&self, _package_name: &str) -> Result<(), InstallError> {
        Err(InstallError::Unsupported("launch"))
    }
}
