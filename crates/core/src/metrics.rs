//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Downloads (starts, outcomes, bytes, duration)
//! - Installs and artifact cleanup

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Download Metrics
// =============================================================================

/// Downloads started total.
pub static DOWNLOADS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("sideload_downloads_started_total", "Total downloads started").unwrap()
});

/// Downloads completed total.
pub static DOWNLOADS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sideload_downloads_completed_total",
        "Total downloads promoted to ready artifacts",
    )
    .unwrap()
});

/// Downloads failed total by failure kind.
pub static DOWNLOADS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sideload_downloads_failed_total", "Total downloads that failed"),
        &["kind"], // "network_error", "server_error", "storage_error"
    )
    .unwrap()
});

/// Downloads cancelled total.
pub static DOWNLOADS_CANCELLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sideload_downloads_cancelled_total",
        "Total downloads cancelled by the caller",
    )
    .unwrap()
});

/// Bytes written to artifact files.
pub static DOWNLOAD_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("sideload_download_bytes_total", "Total bytes downloaded").unwrap()
});

/// Tasks currently queued or running.
pub static ACTIVE_DOWNLOADS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sideload_active_downloads",
        "Number of queued or running downloads",
    )
    .unwrap()
});

/// Download duration in seconds.
pub static DOWNLOAD_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("sideload_download_duration_seconds", "Duration of downloads")
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["result"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// Install Metrics
// =============================================================================

/// Installs total by result.
pub static INSTALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sideload_installs_total", "Total install attempts"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Artifacts deleted after install or on redownload.
pub static ARTIFACTS_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sideload_artifacts_deleted_total",
        "Total artifact files deleted",
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Downloads
        Box::new(DOWNLOADS_STARTED.clone()),
        Box::new(DOWNLOADS_COMPLETED.clone()),
        Box::new(DOWNLOADS_FAILED.clone()),
        Box::new(DOWNLOADS_CANCELLED.clone()),
        Box::new(DOWNLOAD_BYTES.clone()),
        Box::new(ACTIVE_DOWNLOADS.clone()),
        Box::new(DOWNLOAD_DURATION.clone()),
        // Installs
        Box::new(INSTALLS_TOTAL.clone()),
        Box::new(ARTIFACTS_DELETED.clone()),
    ]
}
