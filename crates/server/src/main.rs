use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sideload_core::{
    load_config, validate_config, ArtifactStore, CommandInstaller, HttpFetcher, LogNotifier,
    TaskRegistry,
};
use sideload_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SIDELOAD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Artifact directory: {:?}", config.storage.artifact_dir);

    // Prepare the artifact directory; partial files never survive a restart
    let store = Arc::new(ArtifactStore::new(config.storage.artifact_dir.clone()));
    store
        .ensure_root()
        .await
        .context("Failed to create artifact directory")?;
    let swept = store
        .sweep_partials()
        .await
        .context("Failed to sweep partial downloads")?;
    if swept > 0 {
        info!("Removed {} partial downloads from a previous run", swept);
    }
    match store.scan_ready().await {
        Ok(ready) if !ready.is_empty() => info!(
            "{} ready artifacts on disk awaiting reconciliation",
            ready.len()
        ),
        Ok(_) => {}
        Err(e) => warn!("Failed to scan ready artifacts: {}", e),
    }

    let fetcher = HttpFetcher::new(&config.downloads).context("Failed to create HTTP client")?;
    info!(
        "Max concurrent downloads: {}",
        match config.downloads.max_concurrent_downloads {
            0 => "unlimited".to_string(),
            n => n.to_string(),
        }
    );

    let registry = TaskRegistry::new(config.downloads.clone(), Arc::clone(&store), Arc::new(fetcher))
        .with_notifier(Arc::new(LogNotifier));

    let mut state = AppState::new(config.clone(), registry.clone());
    match &config.installer {
        Some(installer_config) => {
            info!("Using installer: {}", installer_config.program);
            state = state.with_installer(Arc::new(CommandInstaller::new(installer_config.clone())));
        }
        None => info!("No installer configured"),
    }

    let app = create_router(Arc::new(state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    let cancelled = registry.cancel_all().await;
    if cancelled > 0 {
        info!("Cancelled {} downloads on shutdown", cancelled);
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
