//! Ruster Audit API Server
//!
//! REST API for contract source resolution and AI-assisted audits
//!
//! Usage:
//!   cargo run --bin ruster_audit_api
//!
//! Environment:
//!   PORT / RUSTER_PORT - Server port (default: 8080)
//!   RUSTER_HOST        - Server host (default: 0.0.0.0)
//!   RUSTER_API_KEYS    - Comma-separated access keys (unset: open)
//!   RUST_LOG           - Log filter (default: info)

use ruster_audit::api::{create_router, start_cleanup_task, AppState};
use ruster_audit::utils::constants::{APP_NAME, APP_VERSION, DEFAULT_API_HOST, DEFAULT_API_PORT};
use ruster_audit::TelemetryCollector;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let telemetry = Arc::new(TelemetryCollector::new());
    let state = Arc::new(AppState::from_env(telemetry.clone())?);
    let shutdown = state.shutdown.clone();

    start_cleanup_task();
    info!("🧹 Rate limiter cleanup task started");

    let app = create_router(state);

    // Railway-style PORT first, RUSTER_PORT for local dev
    let host = std::env::var("RUSTER_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("RUSTER_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_API_PORT);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🚀 {} v{} API starting on http://{}", APP_NAME, APP_VERSION, addr);
    info!("Endpoints:");
    info!("  POST /v1/contracts/resolve  - Resolve verified source bundle");
    info!("  POST /v1/contracts/analyze  - Resolve + AI security audit");
    info!("  GET  /v1/chains             - Supported chains");
    info!("  GET  /v1/models             - Supported models");
    info!("  GET  /v1/config             - Analyzer configuration (PUT to update)");
    info!("  GET  /v1/stats              - Counters");
    info!("  GET  /v1/health             - Health check");
    info!("Press Ctrl+C for graceful shutdown");

    let listener = TcpListener::bind(addr).await?;

    // In-flight analyses are cancelled, not awaited
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("🛑 Shutdown signal received, cancelling in-flight analyses...");
        shutdown.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    let stats = telemetry.get_stats();
    info!("📊 Final statistics:");
    info!("   Resolutions:        {} ({} failed)", stats.resolutions, stats.resolution_failures);
    info!("   Proxies detected:   {} ({} partial)", stats.proxies_detected, stats.partial_proxies);
    info!(
        "   Analyses:           {} ok, {} failed, {} cancelled",
        stats.analyses_succeeded, stats.analyses_failed, stats.analyses_cancelled
    );
    info!("   Inference attempts: {}", stats.inference_attempts);
    info!("👋 {} API shutdown complete", APP_NAME);

    Ok(())
}
