//! Mock fetcher for testing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};

use crate::worker::{DownloadError, FetchResponse, Fetcher};

/// Default size of the chunks a mock body is split into.
const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone)]
enum ResponseKind {
    Body {
        payload: Bytes,
        advertised: Option<u64>,
    },
    Status(u16),
    NetworkError(String),
}

/// A scripted response.
///
/// Bodies are streamed in fixed-size chunks. A body can be paused on a
/// semaphore gate: every chunk waits for a permit to be available (the
/// permit is released again), so a gate created with zero permits holds the
/// body until the test calls `add_permits`.
#[derive(Debug, Clone)]
pub struct MockResponse {
    kind: ResponseKind,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    fail_after: Option<u64>,
    gate: Option<Arc<Semaphore>>,
}

impl MockResponse {
    /// A successful response with the given body and a matching length.
    pub fn bytes(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let advertised = Some(payload.len() as u64);
        Self {
            kind: ResponseKind::Body {
                payload,
                advertised,
            },
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: None,
            fail_after: None,
            gate: None,
        }
    }

    /// A successful response with a generated body of `len` bytes.
    pub fn sized(len: usize) -> Self {
        let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        Self::bytes(payload)
    }

    /// A non-success HTTP status.
    pub fn status(status: u16) -> Self {
        Self {
            kind: ResponseKind::Status(status),
            ..Self::bytes(Bytes::new())
        }
    }

    /// A connection failure before any headers arrive.
    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::NetworkError(message.into()),
            ..Self::bytes(Bytes::new())
        }
    }

    /// Splits the body into chunks of `size` bytes.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Sends no content length.
    pub fn without_length(mut self) -> Self {
        if let ResponseKind::Body { advertised, .. } = &mut self.kind {
            *advertised = None;
        }
        self
    }

    /// Advertises a content length different from the body size.
    pub fn advertise(mut self, len: u64) -> Self {
        if let ResponseKind::Body { advertised, .. } = &mut self.kind {
            *advertised = Some(len);
        }
        self
    }

    /// Sleeps before every chunk.
    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Breaks the connection once `offset` bytes were sent.
    pub fn fail_after(mut self, offset: u64) -> Self {
        self.fail_after = Some(offset);
        self
    }

    /// Holds every chunk until the gate has a permit.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    /// The URL that was requested.
    pub url: String,
    /// When the request was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the Fetcher trait.
///
/// Provides controllable behavior for testing:
/// - Scripted responses per URL (unknown URLs answer 404)
/// - Chunked, delayed, gated or truncated bodies
/// - Fetch recording for assertions
///
/// # Example
///
/// ```rust,ignore
/// let fetcher = MockFetcher::new();
/// fetcher.set_response("https://x.test/app.apk", MockResponse::sized(1_000_000)).await;
///
/// // ... run downloads ...
///
/// assert_eq!(fetcher.fetch_count("https://x.test/app.apk").await, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockFetcher {
    /// Scripted responses by URL.
    responses: Arc<RwLock<HashMap<String, MockResponse>>>,
    /// Recorded fetch calls.
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
}

impl MockFetcher {
    /// Create a new mock fetcher with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for a URL, replacing any previous one.
    pub async fn set_response(&self, url: &str, response: MockResponse) {
        self.responses
            .write()
            .await
            .insert(url.to_string(), response);
    }

    /// Get all recorded fetches.
    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Number of fetches made for a URL.
    pub async fn fetch_count(&self, url: &str) -> usize {
        self.fetches
            .read()
            .await
            .iter()
            .filter(|f| f.url == url)
            .count()
    }

    /// Total number of fetches.
    pub async fn total_fetches(&self) -> usize {
        self.fetches.read().await.len()
    }
}

struct BodyState {
    payload: Bytes,
    offset: usize,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    fail_after: Option<usize>,
    gate: Option<Arc<Semaphore>>,
    done: bool,
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError> {
        self.fetches.write().await.push(RecordedFetch {
            url: url.to_string(),
            timestamp: Utc::now(),
        });

        let response = self.responses.read().await.get(url).cloned();
        let Some(response) = response else {
            return Err(DownloadError::Server {
                status: 404,
                detail: format!("{} returned Not Found", url),
            });
        };

        let (payload, advertised) = match response.kind {
            ResponseKind::Body {
                payload,
                advertised,
            } => (payload, advertised),
            ResponseKind::Status(status) => {
                return Err(DownloadError::Server {
                    status,
                    detail: format!("{} returned {}", url, status),
                })
            }
            ResponseKind::NetworkError(message) => return Err(DownloadError::Network(message)),
        };

        let state = BodyState {
            payload,
            offset: 0,
            chunk_size: response.chunk_size,
            chunk_delay: response.chunk_delay,
            fail_after: response.fail_after.map(|n| n as usize),
            gate: response.gate,
            done: false,
        };

        let body = futures::stream::unfold(state, |mut state| async move {
            if state.done || state.offset >= state.payload.len() {
                return None;
            }

            if let Some(gate) = &state.gate {
                if gate.acquire().await.is_err() {
                    state.done = true;
                    let error = DownloadError::Network("connection closed".to_string());
                    return Some((Err(error), state));
                }
            }
            if let Some(delay) = state.chunk_delay {
                tokio::time::sleep(delay).await;
            }

            let mut end = (state.offset + state.chunk_size).min(state.payload.len());
            if let Some(limit) = state.fail_after {
                if state.offset >= limit {
                    state.done = true;
                    let error = DownloadError::Network("connection reset by peer".to_string());
                    return Some((Err(error), state));
                }
                end = end.min(limit);
            }

            let chunk = state.payload.slice(state.offset..end);
            state.offset = end;
            Some((Ok(chunk), state))
        })
        .boxed();

        Ok(FetchResponse {
            content_length: advertised,
            body,
        })
    }
}
