//! API Route Configuration

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::{auth_middleware, logging_middleware, rate_limit_middleware};
use crate::utils::constants::MAX_CONCURRENT_ANALYSES;

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Analyses hold an inference call for up to minutes; queue the excess
    let analysis = Router::new()
        .route("/contracts/analyze", post(handlers::analyze_contract))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_ANALYSES * 2));

    let api_v1 = Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        // Catalogues
        .route("/chains", get(handlers::list_chains))
        .route("/models", get(handlers::list_models))
        // Analyzer configuration
        .route("/config", get(handlers::get_config).put(handlers::update_config))
        // Contracts
        .route("/contracts/resolve", post(handlers::resolve_contract))
        .merge(analysis);

    Router::new()
        .nest("/v1", api_v1)
        .route("/health", get(handlers::health_check))
        .with_state(state)
        // Middleware (order matters - bottom runs first)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(rate_limit_middleware))
        .layer(middleware::from_fn(auth_middleware))
}
