//! Configuration for the artifact store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where downloaded artifacts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding temporary and ready artifacts.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("downloads")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.artifact_dir, PathBuf::from("downloads"));
    }

    #[test]
    fn test_deserialize() {
        let config: StorageConfig = toml::from_str(r#"artifact_dir = "/var/lib/sideload""#).unwrap();
        assert_eq!(config.artifact_dir, PathBuf::from("/var/lib/sideload"));
    }
}
