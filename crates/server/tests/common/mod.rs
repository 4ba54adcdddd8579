//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without network
//! access or a platform installer.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use sideload_core::{
    testing::{MockFetcher, MockInstaller},
    ArtifactStore, Config, DownloadConfig, StorageConfig, TaskRegistry,
};
use sideload_server::state::AppState;

/// Re-export fixtures for test convenience
pub use sideload_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Downloads (MockFetcher)
/// - Installs (MockInstaller, when enabled)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_start_download() {
///     let fixture = TestFixture::new().await;
///     fixture.fetcher.set_response(&url, MockResponse::sized(1024)).await;
///
///     let response = fixture.post("/api/v1/downloads", json!({
///         "item_id": "sample-app",
///         "url": url,
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock fetcher - script download responses
    pub fetcher: Arc<MockFetcher>,
    /// Mock installer - present when the fixture has an installer
    pub installer: Option<Arc<MockInstaller>>,
    /// Registry behind the router, for direct inspection
    pub registry: TaskRegistry,
    /// Temporary directory holding the artifacts
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let artifact_dir = temp_dir.path().join("downloads");

        let config = Config {
            storage: StorageConfig {
                artifact_dir: artifact_dir.clone(),
            },
            downloads: DownloadConfig {
                auto_cleanup: test_config.auto_cleanup,
                ..DownloadConfig::default()
            },
            ..Config::default()
        };

        let fetcher = Arc::new(MockFetcher::new());
        let store = Arc::new(ArtifactStore::new(artifact_dir));
        let registry = TaskRegistry::new(
            config.downloads.clone(),
            store,
            Arc::clone(&fetcher) as Arc<dyn sideload_core::Fetcher>,
        );

        let mut state = AppState::new(config, registry.clone());
        let installer = if test_config.enable_installer {
            let installer = Arc::new(MockInstaller::new());
            state = state.with_installer(
                Arc::clone(&installer) as Arc<dyn sideload_core::InstallBridge>
            );
            Some(installer)
        } else {
            None
        };

        let router = sideload_server::api::create_router(Arc::new(state));

        Self {
            router,
            fetcher,
            installer,
            registry,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request and return the body as text.
    pub async fn get_text(&self, path: &str) -> String {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Poll a download until it reaches `state`.
    pub async fn wait_for_state(&self, item_id: &str, state: &str) -> Option<Value> {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            let response = self.get(&format!("/api/v1/downloads/{}", item_id)).await;
            if response.status == StatusCode::OK && response.body["state"] == state {
                return Some(response.body);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Attach a mock installer
    pub enable_installer: bool,
    /// Default for `auto_cleanup` when a request omits it
    pub auto_cleanup: bool,
}

impl TestConfig {
    /// Create config with a mock installer attached.
    pub fn with_installer() -> Self {
        Self {
            enable_installer: true,
            auto_cleanup: false,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
