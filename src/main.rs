mod api;
mod archive;
mod config;
mod storage;

use crate::api::{cors_layer, AppState, ArchiveSettings};
use crate::archive::ArchiveFilter;
use crate::config::AppConfig;
use crate::storage::Database;
use anyhow::Context;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("🚀 Starting subscription comparison API");

    // Load configuration
    let config = AppConfig::load()?;
    info!("📋 Configuration loaded");
    info!("   - Data dir: {}", config.storage.data_dir.display());
    info!("   - Project root: {}", config.archive.root.display());
    info!("   - CORS origins: {}", config.server.cors_origins.join(","));

    // Open the document store once for the whole process
    info!("💾 Opening document store...");
    let store = Arc::new(
        Database::open(&config.storage.data_dir)
            .await
            .context("Failed to open document store")?,
    );
    info!(
        "✅ Document store ready ({} reviews)",
        store.reviews.count().await?
    );

    let state = AppState {
        store: store.clone(),
        archive: Arc::new(ArchiveSettings {
            filter: ArchiveFilter::from_config(&config.archive)
                .excluding_dir_under(&config.archive.root, &config.storage.data_dir),
            root: config.archive.root.clone(),
            file_name: config.archive.file_name.clone(),
        }),
    };

    let app = api::router(state)
        .layer(cors_layer(&config.server.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📡 Available endpoints:");
    info!("   GET  /api/health                             - Health check");
    info!("   GET  /api/status                             - List status checks");
    info!("   POST /api/status                             - Record status check");
    info!("   GET  /api/reviews/{{appId}}                    - List reviews");
    info!("   POST /api/reviews                            - Add review");
    info!("   PUT  /api/reviews/{{appId}}/{{reviewId}}/helpful - Helpful vote");
    info!("   GET  /api/download-project                   - Project archive");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;

    info!("👋 Server shutting down gracefully");

    Ok(())
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}
