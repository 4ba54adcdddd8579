//! Version comparison and update listing handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use sideload_core::{CatalogEntry, CatalogEntryVersionInfo, StaticInstalledApps, UpdateStatus};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct VersionCheckResponse {
    pub status: UpdateStatus,
    /// Whether an install/update action may be offered.
    pub allows_download: bool,
}

/// Request body for listing available updates
#[derive(Debug, Deserialize)]
pub struct UpdatesBody {
    pub entries: Vec<CatalogEntry>,
    /// Installed versions by item id.
    #[serde(default)]
    pub installed: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatesResponse {
    pub updates: Vec<CatalogEntry>,
    pub total: usize,
}

/// Compare an installed version against the catalog's latest one
pub async fn check_versions(
    Json(body): Json<CatalogEntryVersionInfo>,
) -> Json<VersionCheckResponse> {
    let status = body.status();
    Json(VersionCheckResponse {
        status,
        allows_download: status.allows_download(),
    })
}

/// Entries with an update that no download is handling yet
pub async fn available_updates(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdatesBody>,
) -> Json<UpdatesResponse> {
    let installed = StaticInstalledApps::from(body.installed);
    let tasks = state.registry().query_all().await;
    let updates: Vec<CatalogEntry> =
        sideload_core::available_updates(&body.entries, &installed, &tasks)
            .into_iter()
            .cloned()
            .collect();
    let total = updates.len();
    Json(UpdatesResponse { updates, total })
}
