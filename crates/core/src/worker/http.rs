//! HTTP fetcher backed by reqwest.

use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

use super::error::DownloadError;
use super::fetcher::{FetchResponse, Fetcher};
use crate::registry::DownloadConfig;

/// Fetches artifacts over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher using the timeouts and user agent from the config.
    pub fn new(config: &DownloadConfig) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DownloadError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Creates a fetcher around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        debug!("GET {} -> {}", url, status);
        if !status.is_success() {
            return Err(DownloadError::Server {
                status: status.as_u16(),
                detail: format!(
                    "{} returned {}",
                    url,
                    status.canonical_reason().unwrap_or("unexpected status")
                ),
            });
        }

        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| DownloadError::Network(e.to_string())))
            .boxed();

        Ok(FetchResponse {
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_from_default_config() {
        let fetcher = HttpFetcher::new(&DownloadConfig::default()).unwrap();
        assert_eq!(fetcher.name(), "http");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let fetcher = HttpFetcher::new(&DownloadConfig {
            connect_timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        let err = fetcher
            .fetch("http://127.0.0.1:9/artifact.apk")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Network(_)));
    }
}
