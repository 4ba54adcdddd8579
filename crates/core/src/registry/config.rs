//! Configuration for downloads.

use serde::{Deserialize, Serialize};

/// Download behaviour shared by the registry and its workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Minimum time between progress events of one task, in milliseconds.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Percentage step that triggers a progress event before the interval elapses.
    #[serde(default = "default_progress_min_percent_delta")]
    pub progress_min_percent_delta: f64,

    /// Maximum number of running downloads. 0 means unlimited.
    #[serde(default)]
    pub max_concurrent_downloads: usize,

    /// Delete artifacts right after a successful install.
    #[serde(default)]
    pub auto_cleanup: bool,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout between two reads of the response body, in seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Capacity of the task update broadcast channel.
    #[serde(default = "default_update_channel_capacity")]
    pub update_channel_capacity: usize,

    /// Largest slice written to disk between cancellation checks, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_progress_interval_ms() -> u64 {
    250
}

fn default_progress_min_percent_delta() -> f64 {
    1.0
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("sideload/{}", env!("CARGO_PKG_VERSION"))
}

fn default_update_channel_capacity() -> usize {
    256
}

fn default_chunk_size() -> usize {
    64 * 1024 // 64 KB
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            progress_min_percent_delta: default_progress_min_percent_delta(),
            max_concurrent_downloads: 0,
            auto_cleanup: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            user_agent: default_user_agent(),
            update_channel_capacity: default_update_channel_capacity(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl DownloadConfig {
    /// Caps the number of simultaneously running downloads.
    pub fn with_max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent_downloads = limit;
        self
    }

    /// Sets the progress event interval.
    pub fn with_progress_interval_ms(mut self, interval_ms: u64) -> Self {
        self.progress_interval_ms = interval_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.progress_interval_ms, 250);
        assert_eq!(config.progress_min_percent_delta, 1.0);
        assert_eq!(config.max_concurrent_downloads, 0);
        assert!(!config.auto_cleanup);
        assert!(config.user_agent.starts_with("sideload/"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: DownloadConfig = toml::from_str(
            r#"
            max_concurrent_downloads = 3
            auto_cleanup = true
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_downloads, 3);
        assert!(config.auto_cleanup);
        assert_eq!(config.read_timeout_secs, 60);
        assert_eq!(config.chunk_size, 64 * 1024);
    }

    #[test]
    fn test_builders() {
        let config = DownloadConfig::default()
            .with_max_concurrent(2)
            .with_progress_interval_ms(10);
        assert_eq!(config.max_concurrent_downloads, 2);
        assert_eq!(config.progress_interval_ms, 10);
    }
}
