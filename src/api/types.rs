//! API Request/Response Types

use serde::{Deserialize, Serialize};

use crate::models::{
    AnalysisReport, AnalyzerConfig, AppError, CompilerSettings, ContractBundle, ErrorCategory,
    ExplorerContext, ExplorerDiagnostic, ProxyPartial, SourceFile,
};
use crate::utils::constants::{ModelInfo, DEFAULT_CHAIN};

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    /// Explorer's own status/message for resolution failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer: Option<ExplorerDiagnostic>,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self {
            code: "UNAUTHORIZED".to_string(),
            message: "Invalid or missing API key".to_string(),
            category: None,
            explorer: None,
        }
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: "RATE_LIMITED".to_string(),
            message: format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            category: Some(ErrorCategory::Temporary),
            explorer: None,
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            category: Some(err.category()),
            explorer: err.explorer.clone(),
        }
    }
}

// ============================================
// Health & Chains
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct ChainData {
    pub chain_id: u64,
    pub name: String,
    pub explorer_url: String,
    pub api_key_configured: bool,
}

impl From<ExplorerContext> for ChainData {
    fn from(ctx: ExplorerContext) -> Self {
        Self {
            chain_id: ctx.chain_id,
            api_key_configured: ctx.api_key.is_some(),
            name: ctx.chain_name,
            explorer_url: ctx.base_url,
        }
    }
}

// ============================================
// Contract Resolution
// ============================================

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub address: String,
    #[serde(default = "default_chain")]
    pub chain: String,
    /// Return file contents, not just paths
    #[serde(default)]
    pub include_sources: bool,
}

fn default_chain() -> String {
    DEFAULT_CHAIN.to_string()
}

#[derive(Debug, Serialize)]
pub struct FileData {
    pub path: String,
    pub name: String,
    pub role: String,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileData {
    fn from_file(file: &SourceFile, include_content: bool) -> Self {
        Self {
            path: file.path.clone(),
            name: file.name.clone(),
            role: file.role.as_str().to_string(),
            bytes: file.content.len(),
            content: include_content.then(|| file.content.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BundleData {
    pub address: String,
    pub chain_id: u64,
    pub contract_name: String,
    pub compiler_version: String,
    pub settings: CompilerSettings,
    pub is_proxy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_partial: Option<ProxyPartial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub files: Vec<FileData>,
    pub abi: serde_json::Value,
    pub implementation_abi: serde_json::Value,
}

impl BundleData {
    pub fn from_bundle(bundle: &ContractBundle, include_sources: bool) -> Self {
        Self {
            address: bundle.address.clone(),
            chain_id: bundle.chain_id,
            contract_name: bundle.contract_name.clone(),
            compiler_version: bundle.compiler_version.clone(),
            settings: bundle.settings.clone(),
            is_proxy: bundle.is_proxy,
            implementation_address: bundle.implementation_address.clone(),
            proxy_partial: bundle.proxy_partial.clone(),
            license: bundle.license.clone(),
            files: bundle
                .files
                .iter()
                .map(|f| FileData::from_file(f, include_sources))
                .collect(),
            abi: bundle.abi.clone(),
            implementation_abi: bundle.implementation_abi.clone(),
        }
    }
}

// ============================================
// Contract Analysis
// ============================================

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub address: String,
    #[serde(default = "default_chain")]
    pub chain: String,
    /// Overrides of the stored analyzer configuration
    pub model: Option<String>,
    pub language: Option<String>,
    pub super_prompt: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisData {
    pub bundle: BundleData,
    pub report: AnalysisReport,
}

// ============================================
// Analyzer Configuration
// ============================================

#[derive(Debug, Serialize)]
pub struct ConfigData {
    /// Masked, never the key itself
    pub api_key: String,
    pub api_key_configured: bool,
    pub selected_model: String,
    pub language: String,
    pub super_prompt: bool,
}

impl From<&AnalyzerConfig> for ConfigData {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            api_key: config.masked_api_key(),
            api_key_configured: config.api_key.is_some(),
            selected_model: config.selected_model.clone(),
            language: config.language.clone(),
            super_prompt: config.super_prompt,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateConfigRequest {
    pub api_key: Option<String>,
    pub selected_model: Option<String>,
    pub language: Option<String>,
    pub super_prompt: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ModelData {
    pub id: String,
    pub display_name: String,
    pub max_source_bytes: usize,
}

impl From<ModelInfo> for ModelData {
    fn from(model: ModelInfo) -> Self {
        Self {
            id: model.id.to_string(),
            display_name: model.display_name.to_string(),
            max_source_bytes: model.max_source_bytes,
        }
    }
}
