use axum::{
    http::header,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{downloads, handlers, middleware::metrics_middleware, packages, versions, ws};
use crate::metrics::encode_metrics;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Downloads
        .route(
            "/downloads",
            post(downloads::start_download).get(downloads::list_downloads),
        )
        .route("/downloads/summary", get(downloads::get_summary))
        .route(
            "/downloads/{item_id}",
            get(downloads::get_download).delete(downloads::cancel_download),
        )
        .route("/downloads/{item_id}/dismiss", post(downloads::dismiss_download))
        .route(
            "/downloads/{item_id}/redownload",
            post(downloads::redownload),
        )
        .route("/downloads/{item_id}/install", post(downloads::install))
        .route(
            "/downloads/{item_id}/acknowledge",
            post(downloads::acknowledge_installed),
        )
        .route("/downloads/{item_id}/cleanup", post(downloads::resolve_cleanup))
        // Installed packages
        .route("/packages/{package_name}/uninstall", post(packages::uninstall))
        .route("/packages/{package_name}/launch", post(packages::launch))
        // Catalog versions
        .route("/versions/check", post(versions::check_versions))
        .route("/updates", post(versions::available_updates))
        // Real-time updates
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
