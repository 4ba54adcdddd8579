//! Installed package API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use sideload_core::{InstallBridge, InstallError};
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct PackageErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<PackageErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(PackageErrorResponse {
            error: message.into(),
        }),
    )
}

fn install_error(e: InstallError) -> ApiError {
    let status = match &e {
        InstallError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        InstallError::MissingPackage => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    if status == StatusCode::BAD_GATEWAY {
        warn!("Package request failed: {}", e);
    }
    error_response(status, e.to_string())
}

fn installer(state: &AppState) -> Result<&dyn InstallBridge, ApiError> {
    state.installer().ok_or_else(|| {
        error_response(StatusCode::SERVICE_UNAVAILABLE, "No installer configured")
    })
}

/// Uninstall a package through the configured installer
pub async fn uninstall(
    State(state): State<Arc<AppState>>,
    Path(package_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    installer(&state)?
        .uninstall(&package_name)
        .await
        .map_err(install_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Launch an installed package
pub async fn launch(
    State(state): State<Arc<AppState>>,
    Path(package_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    installer(&state)?
        .launch(&package_name)
        .await
        .map_err(install_error)?;
    Ok(StatusCode::NO_CONTENT)
}
