//! Ruster Audit Library
//!
//! Resolves verified smart-contract source from Etherscan-family explorers
//! and runs AI-assisted security analysis over it:
//! - Chain registry with per-chain explorer endpoints and keys
//! - Explorer client with automatic v1 → v2 API migration
//! - Source normalization (single file, multi-file, standard JSON input)
//! - Proxy/implementation resolution with role-tagged paths
//! - Analysis orchestration with retry, backoff and cancellation

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{ContractResolver, Orchestrator, PromptBuilder};
pub use models::{
    AnalysisReport, AnalysisState, AnalyzerConfig, AppError, AppResult, ChainRegistry, ConfigStore,
    ContractBundle, ErrorCategory, ErrorCode, ExplorerContext, OrchestratorSettings, SourceFile,
    SourceRole,
};
pub use providers::{ExplorerClient, InferenceClient};
pub use utils::telemetry::{TelemetryCollector, TelemetryStats};
