//! Streaming download worker.

use futures::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::DownloadError;
use super::fetcher::Fetcher;
use super::throttle::ProgressThrottle;
use crate::registry::DownloadConfig;
use crate::store::{ArtifactPaths, ArtifactStore, StoreError};

/// One download attempt handed to a worker.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub item_id: String,
    pub task_id: String,
    pub url: String,
    pub paths: ArtifactPaths,
}

/// Progress report sent while the body is streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerProgress {
    pub bytes_received: u64,
    pub bytes_total: Option<u64>,
}

/// A fully written temporary file waiting to be promoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub temp_path: PathBuf,
    pub final_path: PathBuf,
    pub bytes: u64,
}

/// Streams one URL into a temporary file.
#[derive(Clone)]
pub struct DownloadWorker {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<ArtifactStore>,
    config: DownloadConfig,
}

impl DownloadWorker {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<ArtifactStore>, config: DownloadConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Runs the job to completion, failure or cancellation.
    ///
    /// Progress is reported through `progress_tx`; a dropped receiver does
    /// not stop the download. On any error the temporary file is removed.
    pub async fn run(
        &self,
        job: DownloadJob,
        progress_tx: mpsc::Sender<WorkerProgress>,
        cancel: CancellationToken,
    ) -> Result<StagedArtifact, DownloadError> {
        let result = self.transfer(&job, &progress_tx, &cancel).await;

        if let Err(ref e) = result {
            if e.is_cancelled() {
                debug!("Download of {} ({}) cancelled", job.item_id, job.task_id);
            } else {
                warn!(
                    "Download of {} ({}) failed: {}",
                    job.item_id, job.task_id, e
                );
            }
            self.store.discard(&job.paths.temp_path).await;
        }

        result
    }

    async fn transfer(
        &self,
        job: &DownloadJob,
        progress_tx: &mpsc::Sender<WorkerProgress>,
        cancel: &CancellationToken,
    ) -> Result<StagedArtifact, DownloadError> {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        debug!(
            "Fetching {} for {} via {}",
            job.url,
            job.item_id,
            self.fetcher.name()
        );
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.fetcher.fetch(&job.url) => response?,
        };

        let total = response.content_length;
        let mut body = response.body;

        let file = self.store.create_temp(&job.paths).await?;
        let mut writer = BufWriter::new(file);
        let temp_path = &job.paths.temp_path;

        let mut throttle = ProgressThrottle::new(
            Duration::from_millis(self.config.progress_interval_ms),
            self.config.progress_min_percent_delta,
        );
        let chunk_size = self.config.chunk_size.max(1);
        let mut received: u64 = 0;

        report(progress_tx, &mut throttle, received, total).await;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            for slice in chunk.chunks(chunk_size) {
                if cancel.is_cancelled() {
                    return Err(DownloadError::Cancelled);
                }

                received += slice.len() as u64;
                if let Some(total) = total {
                    if received > total {
                        return Err(DownloadError::Server {
                            status: 200,
                            detail: format!(
                                "body exceeds advertised length of {} bytes",
                                total
                            ),
                        });
                    }
                }

                writer
                    .write_all(slice)
                    .await
                    .map_err(|e| StoreError::write_failed(temp_path, e))?;

                report(progress_tx, &mut throttle, received, total).await;
            }
        }

        if let Some(total) = total {
            if received < total {
                return Err(DownloadError::Network(format!(
                    "connection closed after {} of {} bytes",
                    received, total
                )));
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| StoreError::write_failed(temp_path, e))?;
        writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| StoreError::write_failed(temp_path, e))?;
        drop(writer);

        // Final report is unconditional so observers see the last byte count.
        let _ = progress_tx
            .send(WorkerProgress {
                bytes_received: received,
                bytes_total: total,
            })
            .await;

        debug!(
            "Staged {} bytes for {} at {}",
            received,
            job.item_id,
            temp_path.display()
        );

        Ok(StagedArtifact {
            temp_path: job.paths.temp_path.clone(),
            final_path: job.paths.final_path.clone(),
            bytes: received,
        })
    }
}

async fn report(
    progress_tx: &mpsc::Sender<WorkerProgress>,
    throttle: &mut ProgressThrottle,
    received: u64,
    total: Option<u64>,
) {
    if throttle.should_emit(received, total, Instant::now()) {
        // A closed receiver only means nobody is watching.
        let _ = progress_tx
            .send(WorkerProgress {
                bytes_received: received,
                bytes_total: total,
            })
            .await;
    }
}
