//! Configuration module for Ruster Audit
//!
//! Chain registry (explorer endpoint + key per chain), the analyzer
//! configuration store, and orchestrator timing settings.
//! Uses constants from utils/constants.rs.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

use super::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{
    chain_identifier_to_id, get_explorer_info, BASE_RETRY_MS, DEFAULT_INFERENCE_ENDPOINT,
    DEFAULT_INFERENCE_TIMEOUT_SECS, DEFAULT_LANGUAGE, DEFAULT_MAX_RETRIES, DEFAULT_MODEL,
    EXPLORER_URL_OVERRIDE_ENV_PREFIX, MAX_RETRY_MS, PUBLIC_EXPLORER_API_KEY,
    SHARED_EXPLORER_KEY_ENV, SUPPORTED_CHAIN_IDS,
};

// ============================================
// CHAIN REGISTRY
// ============================================

/// Resolved explorer endpoint for one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplorerContext {
    pub chain_id: u64,
    pub chain_name: String,
    /// v1-style endpoint, e.g. `https://api.etherscan.io/api`
    pub base_url: String,
    /// Configured key, if any (the client substitutes the public placeholder)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl ExplorerContext {
    pub fn new(chain_id: u64, chain_name: &str, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            chain_id,
            chain_name: chain_name.to_string(),
            base_url: base_url.to_string(),
            api_key,
        }
    }

    /// Key sent on the wire
    pub fn effective_api_key(&self) -> &str {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or(PUBLIC_EXPLORER_API_KEY)
    }
}

/// Chain identifier → explorer endpoint lookup
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    overrides: Vec<ExplorerContext>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with extra or replacement entries (checked before the built-in table)
    pub fn with_contexts(overrides: Vec<ExplorerContext>) -> Self {
        Self { overrides }
    }

    /// Resolve a chain slug, alias or decimal chain id
    pub fn resolve(&self, identifier: &str) -> AppResult<ExplorerContext> {
        if let Some(ctx) = self.find_override(identifier) {
            return Ok(ctx.clone());
        }

        let chain_id =
            chain_identifier_to_id(identifier).ok_or_else(|| AppError::unsupported_chain(identifier))?;
        let info = get_explorer_info(chain_id).ok_or_else(|| AppError::unsupported_chain(identifier))?;

        let base_url = std::env::var(format!("{}{}", EXPLORER_URL_OVERRIDE_ENV_PREFIX, chain_id))
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| info.api_url.to_string());

        let api_key = Self::read_key(info.api_key_env);
        debug!(
            chain_id,
            base_url = %base_url,
            key_configured = api_key.is_some(),
            "Resolved explorer"
        );

        Ok(ExplorerContext::new(chain_id, info.name, &base_url, api_key))
    }

    /// All chains this registry can resolve
    pub fn supported(&self) -> Vec<ExplorerContext> {
        let mut contexts = self.overrides.clone();
        for chain_id in SUPPORTED_CHAIN_IDS {
            if contexts.iter().any(|c| c.chain_id == chain_id) {
                continue;
            }
            if let Ok(ctx) = self.resolve(&chain_id.to_string()) {
                contexts.push(ctx);
            }
        }
        contexts
    }

    fn find_override(&self, identifier: &str) -> Option<&ExplorerContext> {
        let wanted = identifier.trim().to_lowercase();
        let wanted_id = wanted
            .parse::<u64>()
            .ok()
            .or_else(|| chain_identifier_to_id(&wanted));
        self.overrides.iter().find(|ctx| {
            Some(ctx.chain_id) == wanted_id || ctx.chain_name.to_lowercase() == wanted
        })
    }

    /// Chain-specific key first, shared Etherscan key as fallback.
    /// Keys are never logged.
    fn read_key(env_name: &str) -> Option<String> {
        [env_name, SHARED_EXPLORER_KEY_ENV]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|k| !k.is_empty() && k != "YOUR_API_KEY")
    }
}

// ============================================
// ANALYZER CONFIGURATION
// ============================================

/// User-level analysis configuration, read at the start of every analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Inference API key. Never defaulted.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub selected_model: String,
    pub language: String,
    #[serde(default)]
    pub super_prompt: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            selected_model: DEFAULT_MODEL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            super_prompt: false,
        }
    }
}

impl AnalyzerConfig {
    /// Read from `AI_API_KEY`, `AI_MODEL`, `AI_LANGUAGE`, `AI_SUPER_PROMPT`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("AI_API_KEY").ok().filter(|k| !k.is_empty()),
            selected_model: std::env::var("AI_MODEL")
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(defaults.selected_model),
            language: std::env::var("AI_LANGUAGE")
                .ok()
                .filter(|l| !l.is_empty())
                .unwrap_or(defaults.language),
            super_prompt: std::env::var("AI_SUPER_PROMPT")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
        }
    }

    /// Masked key for display
    pub fn masked_api_key(&self) -> String {
        self.api_key.as_deref().map(mask_key).unwrap_or_else(|| "<unset>".to_string())
    }
}

/// Mask a secret, keeping only the last four characters
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Synchronous configuration read/write capability
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> AnalyzerConfig;
    fn save(&self, config: &AnalyzerConfig) -> AppResult<()>;
}

/// Reads configuration from the process environment; read-only
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigStore;

impl ConfigStore for EnvConfigStore {
    fn load(&self) -> AnalyzerConfig {
        AnalyzerConfig::from_env()
    }

    fn save(&self, _config: &AnalyzerConfig) -> AppResult<()> {
        Err(AppError::new(
            ErrorCode::ConfigInvalidValue,
            "Environment configuration store is read-only",
        ))
    }
}

/// In-memory configuration store
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    inner: RwLock<AnalyzerConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> AnalyzerConfig {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, config: &AnalyzerConfig) -> AppResult<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| AppError::new(ErrorCode::Unknown, "Configuration lock poisoned"))?;
        *guard = config.clone();
        info!("💾 Analyzer configuration updated (model: {})", config.selected_model);
        Ok(())
    }
}

// ============================================
// ORCHESTRATOR SETTINGS
// ============================================

/// Inference endpoint and retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// OpenAI-compatible base URL (`/chat/completions` is appended)
    pub endpoint: String,
    /// Transient failures retried after the first attempt
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_INFERENCE_ENDPOINT.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: Duration::from_millis(BASE_RETRY_MS),
            max_backoff: Duration::from_millis(MAX_RETRY_MS),
            request_timeout: Duration::from_secs(DEFAULT_INFERENCE_TIMEOUT_SECS),
        }
    }
}

impl OrchestratorSettings {
    /// Defaults overridden by `AI_ENDPOINT`, `AI_MAX_RETRIES`, `AI_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("AI_ENDPOINT")
                .ok()
                .filter(|e| !e.is_empty())
                .unwrap_or(defaults.endpoint),
            max_retries: std::env::var("AI_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            request_timeout: std::env::var("AI_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_known_chain() {
        let registry = ChainRegistry::new();
        let ctx = registry.resolve("base").unwrap();
        assert_eq!(ctx.chain_id, 8453);
        assert_eq!(ctx.chain_name, "Base");
    }

    #[test]
    fn test_registry_rejects_unknown_chain() {
        let err = ChainRegistry::new().resolve("narnia").unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigUnsupportedChain);
    }

    #[test]
    fn test_registry_override_wins() {
        let registry = ChainRegistry::with_contexts(vec![ExplorerContext::new(
            1,
            "Ethereum",
            "http://localhost:9999/api",
            Some("KEY".to_string()),
        )]);
        let ctx = registry.resolve("ethereum").unwrap();
        assert_eq!(ctx.base_url, "http://localhost:9999/api");
        assert_eq!(ctx.effective_api_key(), "KEY");
    }

    #[test]
    fn test_placeholder_key_when_unset() {
        let ctx = ExplorerContext::new(1, "Ethereum", "https://api.etherscan.io/api", None);
        assert_eq!(ctx.effective_api_key(), PUBLIC_EXPLORER_API_KEY);

        let blank = ExplorerContext::new(1, "Ethereum", "https://api.etherscan.io/api", Some(" ".into()));
        assert_eq!(blank.effective_api_key(), PUBLIC_EXPLORER_API_KEY);
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryConfigStore::default();
        assert_eq!(store.load().selected_model, DEFAULT_MODEL);

        let config = AnalyzerConfig {
            api_key: Some("sk-test".to_string()),
            selected_model: "deepseek/deepseek-chat".to_string(),
            language: "zh".to_string(),
            super_prompt: true,
        };
        store.save(&config).unwrap();
        assert_eq!(store.load(), config);
    }

    #[test]
    fn test_env_store_is_read_only() {
        let err = EnvConfigStore.save(&AnalyzerConfig::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk-or-v1-abcdef123456"), "****3456");
        assert_eq!(mask_key("abc"), "****");
    }
}
