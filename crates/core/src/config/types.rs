use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::install::InstallerConfig;
use crate::registry::DownloadConfig;
use crate::store::StorageConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
    /// External installer; installs are rejected when absent.
    #[serde(default)]
    pub installer: Option<InstallerConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub downloads: DownloadConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer: Option<SanitizedInstallerConfig>,
}

/// Installer config without its argument templates
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedInstallerConfig {
    pub program: String,
    pub supports_uninstall: bool,
    pub supports_launch: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            downloads: config.downloads.clone(),
            installer: config
                .installer
                .as_ref()
                .map(|i| SanitizedInstallerConfig {
                    program: i.program.clone(),
                    supports_uninstall: i.uninstall_args.is_some(),
                    supports_launch: i.launch_args.is_some(),
                }),
        }
    }
}
