//! picam-relay server
//!
//! Main entry point for the relay.

use picam_relay::{web_api, AppConfig, AppState};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picam_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting picam-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        host = %config.host,
        port = config.port,
        heartbeat_timeout_secs = config.heartbeat_timeout.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        max_clients = config.max_clients,
        max_frame_bytes = config.max_frame_bytes,
        serve_stale_snapshot = config.serve_stale_snapshot,
        "Configuration loaded"
    );

    let state = AppState::new(config);

    // Start staleness sweep task: status queries are never more stale
    // than one sweep interval, even while an ingest read is pending
    let sweep_source = state.source.clone();
    let heartbeat_timeout = state.config.heartbeat_timeout;
    let sweep_interval = state.config.sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sweep_source.sweep(heartbeat_timeout).await;
        }
    });

    let app = web_api::create_router(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown signal handler");
        return;
    }
    tracing::info!("Shutdown signal received, closing connections");
}
