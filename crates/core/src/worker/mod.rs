//! Download worker: one fetch-and-write per task.
//!
//! The worker pulls the response body from a [`Fetcher`], writes it to the
//! task's temporary file in bounded chunks and reports progress at a bounded
//! rate. It never promotes the file itself: it hands back a
//! [`StagedArtifact`] and the registry promotes it inside the same critical
//! section that marks the task ready, so a cancellation racing a completion
//! has exactly one outcome.
//!
//! Cancellation is cooperative. The token is checked before the request, and
//! between chunks; on cancellation or any failure the temporary file is
//! deleted.

mod download;
mod error;
mod fetcher;
mod http;
mod throttle;

pub use download::{DownloadJob, DownloadWorker, StagedArtifact, WorkerProgress};
pub use error::DownloadError;
pub use fetcher::{BodyStream, FetchResponse, Fetcher};
pub use http::HttpFetcher;
pub use throttle::ProgressThrottle;
