//! Configuration for the command installer.

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the artifact path.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Placeholder replaced by the package name.
pub const PACKAGE_PLACEHOLDER: &str = "{package}";

/// External program used to install artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Program to run, e.g. `adb` or `msiexec`.
    pub program: String,

    /// Install arguments. `{path}` and `{package}` are substituted.
    #[serde(default = "default_install_args")]
    pub args: Vec<String>,

    /// Uninstall arguments; uninstall is unsupported when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall_args: Option<Vec<String>>,

    /// Launch arguments; launch is unsupported when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_args: Option<Vec<String>>,
}

fn default_install_args() -> Vec<String> {
    vec![PATH_PLACEHOLDER.to_string()]
}

impl InstallerConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: default_install_args(),
            uninstall_args: None,
            launch_args: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}
