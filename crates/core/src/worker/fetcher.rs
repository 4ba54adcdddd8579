//! Transport abstraction used by download workers.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use super::error::DownloadError;

/// Stream of body chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// A successful response whose body has not been read yet.
pub struct FetchResponse {
    /// Advertised body length, if the server sent one.
    pub content_length: Option<u64>,
    /// Response body.
    pub body: BodyStream,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens a download stream for a URL.
///
/// Implementations map non-success statuses to [`DownloadError::Server`] and
/// connection failures (including the transport's own timeouts) to
/// [`DownloadError::Network`]. They never retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the name of this fetcher implementation.
    fn name(&self) -> &str;

    /// Starts a request and returns once response headers are available.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError>;
}
