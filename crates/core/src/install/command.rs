//! Installer that shells out to an external program.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use super::config::{InstallerConfig, PACKAGE_PLACEHOLDER, PATH_PLACEHOLDER};
use super::error::InstallError;
use super::traits::InstallBridge;

/// Longest stderr excerpt kept in errors.
const MAX_STDERR_LEN: usize = 2048;

/// Runs a configured program to install, uninstall or launch packages.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    config: InstallerConfig,
}

impl CommandInstaller {
    pub fn new(config: InstallerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    async fn run(
        &self,
        template: &[String],
        path: Option<&Path>,
        package: Option<&str>,
    ) -> Result<(), InstallError> {
        let args = substitute(template, path, package)?;
        debug!("Running installer: {} {:?}", self.config.program, args);

        let output = Command::new(&self.config.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InstallError::ProgramNotFound {
                        program: self.config.program.clone(),
                    }
                } else {
                    InstallError::Io(e)
                }
            })?;

        if !output.status.success() {
            let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.len() > MAX_STDERR_LEN {
                let mut end = MAX_STDERR_LEN;
                while !stderr.is_char_boundary(end) {
                    end -= 1;
                }
                stderr.truncate(end);
            }
            return Err(InstallError::failed(
                format!(
                    "{} exited with code {:?}",
                    self.config.program,
                    output.status.code()
                ),
                (!stderr.is_empty()).then_some(stderr),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl InstallBridge for CommandInstaller {
    fn name(&self) -> &str {
        "command"
    }

    async fn install(
        &self,
        artifact_path: &Path,
        package_name: Option<&str>,
    ) -> Result<(), InstallError> {
        if !tokio::fs::try_exists(artifact_path).await? {
            return Err(InstallError::ArtifactMissing {
                path: artifact_path.to_path_buf(),
            });
        }

        self.run(&self.config.args, Some(artifact_path), package_name)
            .await?;
        info!("Installed {}", artifact_path.display());
        Ok(())
    }

    async fn uninstall(&self, package_name: &str) -> Result<(), InstallError> {
        let Some(args) = &self.config.uninstall_args else {
            return Err(InstallError::Unsupported("uninstall"));
        };
        self.run(args, None, Some(package_name)).await?;
        info!("Uninstalled {}", package_name);
        Ok(())
    }

    async fn launch(&self, package_name: &str) -> Result<(), InstallError> {
        let Some(args) = &self.config.launch_args else {
            return Err(InstallError::Unsupported("launch"));
        };
        self.run(args, None, Some(package_name)).await
    }
}

/// Replaces `{path}` and `{package}` in every argument.
fn substitute(
    template: &[String],
    path: Option<&Path>,
    package: Option<&str>,
) -> Result<Vec<String>, InstallError> {
    let path = path.map(|p| p.to_string_lossy().into_owned());

    template
        .iter()
        .map(|arg| {
            let mut arg = arg.clone();
            if arg.contains(PATH_PLACEHOLDER) {
                arg = arg.replace(PATH_PLACEHOLDER, path.as_deref().unwrap_or_default());
            }
            if arg.contains(PACKAGE_PLACEHOLDER) {
                let package = package.ok_or(InstallError::MissingPackage)?;
                arg = arg.replace(PACKAGE_PLACEHOLDER, package);
            }
            Ok(arg)
        })
        .collect()
}
