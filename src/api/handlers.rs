//! API Request Handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::types::*;
use crate::core::{check_preconditions, ContractResolver, Orchestrator};
use crate::models::{
    AnalysisState, AnalyzerConfig, AppError, AppResult, ChainRegistry, ConfigStore, ContractBundle, ErrorCode,
    MemoryConfigStore, OrchestratorSettings,
};
use crate::utils::constants::{get_model_info, MAX_CONCURRENT_ANALYSES, SUPPORTED_MODELS};
use crate::utils::telemetry::{TelemetryCollector, TelemetryStats};

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

/// Shared application state
pub struct AppState {
    pub resolver: ContractResolver,
    pub orchestrator: Orchestrator,
    pub config_store: Arc<dyn ConfigStore>,
    pub telemetry: Arc<TelemetryCollector>,
    /// Parent of every analysis cancel token; cancelled on shutdown
    pub shutdown: CancellationToken,
    pub start_time: Instant,
    pub analysis_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        resolver: ContractResolver,
        orchestrator: Orchestrator,
        config_store: Arc<dyn ConfigStore>,
        telemetry: Arc<TelemetryCollector>,
    ) -> Self {
        Self {
            resolver,
            orchestrator,
            config_store,
            telemetry,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
            analysis_semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_ANALYSES)),
        }
    }

    /// State wired from environment variables
    pub fn from_env(telemetry: Arc<TelemetryCollector>) -> AppResult<Self> {
        let resolver = ContractResolver::new(ChainRegistry::new())?;
        let orchestrator = Orchestrator::with_telemetry(OrchestratorSettings::from_env(), telemetry.clone())?;
        let config_store = Arc::new(MemoryConfigStore::new(AnalyzerConfig::from_env()));
        Ok(Self::new(resolver, orchestrator, config_store, telemetry))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Resolve and count the outcome
    async fn resolve_recorded(&self, address: &str, chain: &str) -> AppResult<ContractBundle> {
        let start = Instant::now();
        let result = self.resolver.resolve(address, chain).await;
        match &result {
            Ok(bundle) => self
                .telemetry
                .record_resolution(bundle, start.elapsed().as_millis() as u64),
            Err(_) => self.telemetry.record_resolution_failure(),
        }
        result
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Map an `AppError` to its HTTP status and error body
fn failure(err: &AppError, start: Instant) -> (StatusCode, Json<ApiResponse<()>>) {
    let status = StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiResponse::error(err.into(), elapsed_ms(start))))
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<TelemetryStats>> {
    let start = Instant::now();
    Json(ApiResponse::success(state.telemetry.get_stats(), elapsed_ms(start)))
}

// ============================================
// Chains & Models
// ============================================

pub async fn list_chains(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<ChainData>>> {
    let start = Instant::now();
    let chains = state
        .resolver
        .registry()
        .supported()
        .into_iter()
        .map(ChainData::from)
        .collect();
    Json(ApiResponse::success(chains, elapsed_ms(start)))
}

pub async fn list_models() -> Json<ApiResponse<Vec<ModelData>>> {
    let start = Instant::now();
    let models = SUPPORTED_MODELS.iter().copied().map(ModelData::from).collect();
    Json(ApiResponse::success(models, elapsed_ms(start)))
}

// ============================================
// Analyzer Configuration
// ============================================

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ConfigData>> {
    let start = Instant::now();
    let config = state.config_store.load();
    Json(ApiResponse::success(ConfigData::from(&config), elapsed_ms(start)))
}

pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateConfigRequest>,
) -> ApiResult<ConfigData> {
    let start = Instant::now();
    let mut config = state.config_store.load();

    if let Some(model) = req.selected_model {
        if get_model_info(&model).is_none() {
            return Err(failure(&AppError::invalid_model(&model), start));
        }
        config.selected_model = model;
    }
    if let Some(key) = req.api_key {
        config.api_key = Some(key).filter(|k| !k.trim().is_empty());
    }
    if let Some(language) = req.language {
        if language.trim().is_empty() {
            return Err(failure(&AppError::bad_request("language must not be empty"), start));
        }
        config.language = language;
    }
    if let Some(super_prompt) = req.super_prompt {
        config.super_prompt = super_prompt;
    }

    state.config_store.save(&config).map_err(|e| failure(&e, start))?;

    Ok(Json(ApiResponse::success(ConfigData::from(&config), elapsed_ms(start))))
}

// ============================================
// Contract Resolution
// ============================================

pub async fn resolve_contract(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<BundleData> {
    let start = Instant::now();

    let bundle = state
        .resolve_recorded(&req.address, &req.chain)
        .await
        .map_err(|e| {
            warn!("Resolution failed for {}: {}", req.address, e);
            failure(&e, start)
        })?;

    Ok(Json(ApiResponse::success(
        BundleData::from_bundle(&bundle, req.include_sources),
        elapsed_ms(start),
    )))
}

// ============================================
// Contract Analysis
// ============================================

pub async fn analyze_contract(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<AnalysisData> {
    let start = Instant::now();

    let mut config = state.config_store.load();
    if let Some(model) = req.model {
        config.selected_model = model;
    }
    if let Some(language) = req.language {
        config.language = language;
    }
    if let Some(super_prompt) = req.super_prompt {
        config.super_prompt = super_prompt;
    }

    // Fail configuration problems before spending explorer quota
    if let Err(e) = check_preconditions(&config) {
        state.telemetry.record_analysis(AnalysisState::Failed);
        return Err(failure(&e, start));
    }

    let _permit = state
        .analysis_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| failure(&AppError::with_source(ErrorCode::Unknown, "Analysis pool closed", e), start))?;

    let bundle = state
        .resolve_recorded(&req.address, &req.chain)
        .await
        .map_err(|e| failure(&e, start))?;

    info!("🧠 Analysis requested for {} ({})", bundle.contract_name, bundle.address);
    let report = state
        .orchestrator
        .analyze(&bundle, &config, state.shutdown.child_token())
        .await
        .map_err(|e| failure(&e, start))?;

    Ok(Json(ApiResponse::success(
        AnalysisData {
            bundle: BundleData::from_bundle(&bundle, false),
            report,
        },
        elapsed_ms(start),
    )))
}
