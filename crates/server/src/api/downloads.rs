//! Download API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sideload_core::{DownloadRequest, QueueSummary, RegistryError, Started, Task};
use tracing::warn;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for installing a ready artifact
#[derive(Debug, Default, Deserialize)]
pub struct InstallBody {
    /// Delete the artifact after a successful install; defaults to the config.
    pub auto_cleanup: Option<bool>,
    /// Package identifier handed to the installer.
    pub package_name: Option<String>,
}

/// Request body for acknowledging an install done elsewhere
#[derive(Debug, Default, Deserialize)]
pub struct AcknowledgeBody {
    pub auto_cleanup: Option<bool>,
}

/// Request body for resolving a pending cleanup
#[derive(Debug, Deserialize)]
pub struct CleanupBody {
    pub delete: bool,
}

/// Response for listing downloads
#[derive(Debug, Serialize)]
pub struct ListDownloadsResponse {
    pub downloads: Vec<Task>,
    pub total: usize,
}

/// Response for operations that may remove the task
#[derive(Debug, Serialize)]
pub struct TaskOutcomeResponse {
    /// The task after the operation, `null` once it was removed.
    pub task: Option<Task>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    /// Whether a file was actually deleted.
    pub deleted: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct DownloadErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<DownloadErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(DownloadErrorResponse {
            error: message.into(),
        }),
    )
}

fn registry_error(e: RegistryError) -> ApiError {
    let status = match &e {
        RegistryError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::InvalidStateTransition { .. } | RegistryError::InstallInProgress(_) => {
            StatusCode::CONFLICT
        }
        RegistryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RegistryError::Install(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        warn!("Download request failed: {}", e);
    }
    error_response(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// Start (or join) a download
pub async fn start_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DownloadRequest>,
) -> Result<(StatusCode, Json<Started>), ApiError> {
    if body.item_id.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "item_id cannot be empty",
        ));
    }
    if body.url.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "url cannot be empty"));
    }

    let started = state
        .registry()
        .start_with(body)
        .await
        .map_err(registry_error)?;
    let status = if started.joined {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(started)))
}

/// List all downloads in creation order
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> Json<ListDownloadsResponse> {
    let downloads = state.registry().query_all().await;
    let total = downloads.len();
    Json(ListDownloadsResponse { downloads, total })
}

/// Task counts per queue section
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<QueueSummary> {
    Json(state.registry().summary().await)
}

/// Get the task of one item
pub async fn get_download(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    state
        .registry()
        .query(&item_id)
        .await
        .map(Json)
        .ok_or_else(|| registry_error(RegistryError::TaskNotFound(item_id)))
}

/// Cancel an active download
pub async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let cancelled = state
        .registry()
        .cancel(&item_id)
        .await
        .map_err(registry_error)?;
    Ok(Json(CancelResponse { cancelled }))
}

/// Remove a cancelled or failed task
pub async fn dismiss_download(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    state
        .registry()
        .dismiss(&item_id)
        .await
        .map(Json)
        .map_err(registry_error)
}

/// Drop a ready artifact so the item can be downloaded again
pub async fn redownload(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .registry()
        .redownload(&item_id)
        .await
        .map_err(registry_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Install a ready artifact through the configured installer
pub async fn install(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Json(body): Json<InstallBody>,
) -> Result<Json<TaskOutcomeResponse>, ApiError> {
    let Some(installer) = state.installer() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "No installer configured",
        ));
    };
    let auto_cleanup = body
        .auto_cleanup
        .unwrap_or(state.config().downloads.auto_cleanup);

    let task = state
        .registry()
        .install(
            &item_id,
            installer,
            body.package_name.as_deref(),
            auto_cleanup,
        )
        .await
        .map_err(registry_error)?;
    Ok(Json(TaskOutcomeResponse { task }))
}

/// Record an install performed outside the service
pub async fn acknowledge_installed(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Json(body): Json<AcknowledgeBody>,
) -> Result<Json<TaskOutcomeResponse>, ApiError> {
    let auto_cleanup = body
        .auto_cleanup
        .unwrap_or(state.config().downloads.auto_cleanup);
    let task = state
        .registry()
        .acknowledge_installed(&item_id, auto_cleanup)
        .await
        .map_err(registry_error)?;
    Ok(Json(TaskOutcomeResponse { task }))
}

/// Keep or delete the artifact of an installed item
pub async fn resolve_cleanup(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Json(body): Json<CleanupBody>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let deleted = state
        .registry()
        .resolve_cleanup(&item_id, body.delete)
        .await
        .map_err(registry_error)?;
    Ok(Json(CleanupResponse { deleted }))
}
