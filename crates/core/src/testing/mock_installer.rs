//! Mock install bridge for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};

use crate::install::{InstallBridge, InstallError};

/// A recorded install for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInstall {
    /// Artifact that was handed to the installer.
    pub path: PathBuf,
    /// Package identifier passed along, if any.
    pub package_name: Option<String>,
    /// Whether the install succeeded.
    pub success: bool,
}

/// Mock implementation of the InstallBridge trait.
///
/// Records every install, uninstall and launch; the next call can be
/// scripted to fail, and installs can be held on a gate until a permit is released.
#[derive(Debug, Default)]
pub struct MockInstaller {
    /// Recorded installs.
    installs: Arc<RwLock<Vec<RecordedInstall>>>,
    /// Recorded uninstalls.
    uninstalls: Arc<RwLock<Vec<String>>>,
    /// Recorded launches.
    launches: Arc<RwLock<Vec<String>>>,
    /// If set, the next call fails with this reason.
    next_error: Arc<RwLock<Option<String>>>,
    /// Installs wait for a permit here before finishing.
    gate: Arc<RwLock<Option<Arc<Semaphore>>>>,
    /// Installs that were entered, finished or not.
    attempts: Arc<AtomicUsize>,
}

impl MockInstaller {
    /// Create a new mock installer that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next install, uninstall or launch fail.
    pub async fn fail_next(&self, reason: impl Into<String>) {
        *self.next_error.write().await = Some(reason.into());
    }

    /// Hold every install until `gate` hands out a permit.
    pub async fn hold_installs(&self, gate: Arc<Semaphore>) {
        *self.gate.write().await = Some(gate);
    }

    /// Number of installs entered so far, including held ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Get all recorded installs.
    pub async fn recorded_installs(&self) -> Vec<RecordedInstall> {
        self.installs.read().await.clone()
    }

    /// Number of successful installs.
    pub async fn install_count(&self) -> usize {
        self.installs
            .read()
            .await
            .iter()
            .filter(|i| i.success)
            .count()
    }

    /// Packages that were uninstalled.
    pub async fn recorded_uninstalls(&self) -> Vec<String> {
        self.uninstalls.read().await.clone()
    }

    /// Packages that were launched.
    pub async fn recorded_launches(&self) -> Vec<String> {
        self.launches.read().await.clone()
    }

    async fn take_error(&self) -> Result<(), InstallError> {
        match self.next_error.write().await.take() {
            Some(reason) => Err(InstallError::failed(reason, None)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl InstallBridge for MockInstaller {
    fn name(&self) -> &str {
        "mock"
    }

    async fn install(
        &self,
        artifact_path: &Path,
        package_name: Option<&str>,
    ) -> Result<(), InstallError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.read().await.clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| InstallError::failed("install gate closed", None))?;
        }

        let error = self.next_error.write().await.take();
        self.installs.write().await.push(RecordedInstall {
            path: artifact_path.to_path_buf(),
            package_name: package_name.map(str::to_string),
            success: error.is_none(),
        });

        match error {
            Some(reason) => Err(InstallError::failed(reason, None)),
            None => Ok(()),
        }
    }

    async fn uninstall(&self, package_name: &str) -> Result<(), InstallError> {
        self.take_error().await?;
        self.uninstalls.write().await.push(package_name.to_string());
        Ok(())
    }

    async fn launch(&self, package_name: &str) -> Result<(), InstallError> {
        self.take_error().await?;
        self.launches.write().await.push(package_name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_installs() {
        let installer = MockInstaller::new();
        installer.fail_next("boom").await;

        assert!(installer.install(Path::new("/a.apk"), None).await.is_err());
        assert!(installer
            .install(Path::new("/a.apk"), Some("com.a"))
            .await
            .is_ok());

        let installs = installer.recorded_installs().await;
        assert_eq!(installs.len(), 2);
        assert!(!installs[0].success);
        assert_eq!(installer.install_count().await, 1);

        installer.uninstall("com.a").await.unwrap();
        assert_eq!(installer.recorded_uninstalls().await, vec!["com.a"]);

        installer.fail_next("not installed").await;
        assert!(installer.launch("com.b").await.is_err());
        installer.launch("com.a").await.unwrap();
        assert_eq!(installer.recorded_launches().await, vec!["com.a"]);
    }

    #[tokio::test]
    async fn test_held_install_waits_for_permit() {
        let installer = Arc::new(MockInstaller::new());
        let gate = Arc::new(Semaphore::new(0));
        installer.hold_installs(gate.clone()).await;

        let handle = tokio::spawn({
            let installer = installer.clone();
            async move { installer.install(Path::new("/a.apk"), None).await }
        });
        while installer.attempts() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(installer.recorded_installs().await.is_empty());

        gate.add_permits(1);
        assert!(handle.await.unwrap().is_ok());
        assert_eq!(installer.install_count().await, 1);
    }
}
