//! Constants Module - Single Source of Truth
//!
//! Chain registry table, explorer wire constants, model registry and the
//! fixed audit prompt texts. No hardcoded values in other modules.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "Ruster Audit";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = "RusterAudit/0.1.0";

// ============================================
// EXPLORER CONSTANTS
// ============================================

/// Default timeout for explorer requests (seconds)
pub const DEFAULT_EXPLORER_TIMEOUT_SECS: u64 = 20;

/// Public placeholder key accepted by most Etherscan-family explorers.
/// Empty keys are rejected outright, this one is merely rate limited.
pub const PUBLIC_EXPLORER_API_KEY: &str = "YourApiKeyToken";

/// `status` value of a successful explorer response
pub const EXPLORER_STATUS_OK: &str = "1";

/// `status` value of a failed explorer response
pub const EXPLORER_STATUS_NOTOK: &str = "0";

/// Message used when the explorer body could not be decoded
pub const UNPARSED_RESPONSE_MESSAGE: &str = "unparsed response";

/// Role prefix for files that belong to the proxy shell
pub const PROXY_PATH_PREFIX: &str = "proxy/";

/// Role prefix for files that belong to the implementation
pub const IMPLEMENTATION_PATH_PREFIX: &str = "implementation/";

// ============================================
// CHAIN IDS
// ============================================

/// Ethereum Mainnet
pub const CHAIN_ID_ETHEREUM: u64 = 1;
/// BNB Smart Chain
pub const CHAIN_ID_BSC: u64 = 56;
/// Polygon
pub const CHAIN_ID_POLYGON: u64 = 137;
/// Arbitrum One
pub const CHAIN_ID_ARBITRUM: u64 = 42161;
/// Optimism
pub const CHAIN_ID_OPTIMISM: u64 = 10;
/// Avalanche C-Chain
pub const CHAIN_ID_AVALANCHE: u64 = 43114;
/// Base
pub const CHAIN_ID_BASE: u64 = 8453;
/// Sepolia testnet
pub const CHAIN_ID_SEPOLIA: u64 = 11155111;

/// All chains with a known explorer
pub const SUPPORTED_CHAIN_IDS: [u64; 8] = [
    CHAIN_ID_ETHEREUM,
    CHAIN_ID_BSC,
    CHAIN_ID_POLYGON,
    CHAIN_ID_ARBITRUM,
    CHAIN_ID_OPTIMISM,
    CHAIN_ID_AVALANCHE,
    CHAIN_ID_BASE,
    CHAIN_ID_SEPOLIA,
];

/// Static explorer entry for one chain
#[derive(Debug, Clone, Copy)]
pub struct ExplorerInfo {
    pub chain_id: u64,
    /// Short identifier accepted by the registry ("ethereum", "bsc", ...)
    pub slug: &'static str,
    pub name: &'static str,
    /// v1-style API endpoint
    pub api_url: &'static str,
    /// Chain-specific API key environment variable
    pub api_key_env: &'static str,
}

/// Get explorer info for a chain
pub fn get_explorer_info(chain_id: u64) -> Option<ExplorerInfo> {
    let info = match chain_id {
        CHAIN_ID_ETHEREUM => ExplorerInfo {
            chain_id,
            slug: "ethereum",
            name: "Ethereum",
            api_url: "https://api.etherscan.io/api",
            api_key_env: "ETHERSCAN_API_KEY",
        },
        CHAIN_ID_BSC => ExplorerInfo {
            chain_id,
            slug: "bsc",
            name: "BNB Smart Chain",
            api_url: "https://api.bscscan.com/api",
            api_key_env: "BSCSCAN_API_KEY",
        },
        CHAIN_ID_POLYGON => ExplorerInfo {
            chain_id,
            slug: "polygon",
            name: "Polygon",
            api_url: "https://api.polygonscan.com/api",
            api_key_env: "POLYGONSCAN_API_KEY",
        },
        CHAIN_ID_ARBITRUM => ExplorerInfo {
            chain_id,
            slug: "arbitrum",
            name: "Arbitrum One",
            api_url: "https://api.arbiscan.io/api",
            api_key_env: "ARBISCAN_API_KEY",
        },
        CHAIN_ID_OPTIMISM => ExplorerInfo {
            chain_id,
            slug: "optimism",
            name: "Optimism",
            api_url: "https://api-optimistic.etherscan.io/api",
            api_key_env: "OPTIMISM_ETHERSCAN_API_KEY",
        },
        CHAIN_ID_AVALANCHE => ExplorerInfo {
            chain_id,
            slug: "avalanche",
            name: "Avalanche C-Chain",
            api_url: "https://api.snowtrace.io/api",
            api_key_env: "SNOWTRACE_API_KEY",
        },
        CHAIN_ID_BASE => ExplorerInfo {
            chain_id,
            slug: "base",
            name: "Base",
            api_url: "https://api.basescan.org/api",
            api_key_env: "BASESCAN_API_KEY",
        },
        CHAIN_ID_SEPOLIA => ExplorerInfo {
            chain_id,
            slug: "sepolia",
            name: "Sepolia",
            api_url: "https://api-sepolia.etherscan.io/api",
            api_key_env: "ETHERSCAN_API_KEY",
        },
        _ => return None,
    };
    Some(info)
}

/// Map a chain identifier (slug, alias or decimal id) to a chain id
pub fn chain_identifier_to_id(identifier: &str) -> Option<u64> {
    let normalized = identifier.trim().to_lowercase();
    if let Ok(id) = normalized.parse::<u64>() {
        return SUPPORTED_CHAIN_IDS.contains(&id).then_some(id);
    }
    match normalized.as_str() {
        "ethereum" | "eth" | "mainnet" => Some(CHAIN_ID_ETHEREUM),
        "bsc" | "bnb" | "binance" => Some(CHAIN_ID_BSC),
        "polygon" | "matic" => Some(CHAIN_ID_POLYGON),
        "arbitrum" | "arb" => Some(CHAIN_ID_ARBITRUM),
        "optimism" | "op" => Some(CHAIN_ID_OPTIMISM),
        "avalanche" | "avax" => Some(CHAIN_ID_AVALANCHE),
        "base" => Some(CHAIN_ID_BASE),
        "sepolia" => Some(CHAIN_ID_SEPOLIA),
        _ => None,
    }
}

/// Shared fallback env var for explorer keys (Etherscan v2 keys work everywhere)
pub const SHARED_EXPLORER_KEY_ENV: &str = "ETHERSCAN_API_KEY";

/// Env var prefix overriding the explorer endpoint per chain id
pub const EXPLORER_URL_OVERRIDE_ENV_PREFIX: &str = "EXPLORER_BASE_URL_";

/// Chain used when a request names none
pub const DEFAULT_CHAIN: &str = "ethereum";

// ============================================
// API SERVER CONSTANTS
// ============================================

/// Default bind host
pub const DEFAULT_API_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_API_PORT: u16 = 8080;

/// Analyses allowed in flight at once; each holds one inference request
pub const MAX_CONCURRENT_ANALYSES: usize = 8;

/// Requests per client per rate-limit window
pub const RATE_LIMIT_REQUESTS: u32 = 60;

/// Rate-limit window (seconds)
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

// ============================================
// INFERENCE CONSTANTS
// ============================================

/// Default OpenAI-compatible inference endpoint
pub const DEFAULT_INFERENCE_ENDPOINT: &str = "https://openrouter.ai/api/v1";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Default report language tag
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default inference request timeout (seconds)
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 120;

/// Transient failures retried after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// First backoff delay (ms), doubled per retry
pub const BASE_RETRY_MS: u64 = 1000;

/// Backoff ceiling (ms)
pub const MAX_RETRY_MS: u64 = 16000;

/// Jitter percentage applied to each backoff delay
pub const RETRY_JITTER_PERCENT: u64 = 20;

/// Supported inference model
#[derive(Debug, Clone, Copy)]
pub struct ModelInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    /// Upper bound for the source section of the prompt, in UTF-8 bytes
    pub max_source_bytes: usize,
}

/// Models accepted by the orchestrator
pub const SUPPORTED_MODELS: [ModelInfo; 6] = [
    ModelInfo {
        id: "openai/gpt-4o",
        display_name: "GPT-4o",
        max_source_bytes: 360_000,
    },
    ModelInfo {
        id: "openai/gpt-4o-mini",
        display_name: "GPT-4o mini",
        max_source_bytes: 360_000,
    },
    ModelInfo {
        id: "anthropic/claude-3.5-sonnet",
        display_name: "Claude 3.5 Sonnet",
        max_source_bytes: 560_000,
    },
    ModelInfo {
        id: "google/gemini-2.0-flash-001",
        display_name: "Gemini 2.0 Flash",
        max_source_bytes: 2_000_000,
    },
    ModelInfo {
        id: "deepseek/deepseek-chat",
        display_name: "DeepSeek V3",
        max_source_bytes: 180_000,
    },
    ModelInfo {
        id: "deepseek/deepseek-r1",
        display_name: "DeepSeek R1",
        max_source_bytes: 180_000,
    },
];

/// Look up a supported model by id
pub fn get_model_info(model_id: &str) -> Option<ModelInfo> {
    SUPPORTED_MODELS.iter().copied().find(|m| m.id == model_id)
}

/// Human-readable language name for a report language tag (unknown → English)
pub fn get_language_name(tag: &str) -> &'static str {
    match tag.trim().to_lowercase().as_str() {
        "zh" | "zh-cn" | "zh-hans" => "Simplified Chinese",
        "zh-tw" | "zh-hant" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "ru" => "Russian",
        "pt" => "Portuguese",
        "id" => "Indonesian",
        "vi" => "Vietnamese",
        _ => "English",
    }
}

// ============================================
// PROMPT TEXTS
// ============================================

/// System role for every inference call
pub const AUDITOR_PERSONA: &str = "You are a senior smart contract security auditor. \
You review Solidity and Vyper code for vulnerabilities, centralization risks and \
logic errors, and you cite exact file paths and functions for every finding.";

/// Audit instruction template, `{metadata}` and `{sources}` are substituted
pub const AUDIT_TEMPLATE: &str = "Perform a comprehensive security audit of the smart contract below.

## Contract metadata
{metadata}

## Instructions
1. Summarize what the contract does and who holds privileged roles.
2. List every vulnerability with severity (Critical, High, Medium, Low, Informational), \
the affected file path and function, an explanation and a recommended fix.
3. Review access control, upgradeability, external calls, arithmetic and token accounting.
4. If the contract is a proxy, focus on the implementation logic and storage layout compatibility.
5. Finish with an overall risk rating.

Format the whole report as Markdown.

## Source code
{sources}";

/// Extra guidance added when the super prompt flag is set
pub const SUPER_PROMPT: &str = "## Deep analysis mode
Think like an attacker with unlimited capital and flash loans. For each external or public \
function, trace state changes step by step, consider reentrancy across contracts, price \
oracle manipulation, signature replay, front-running, denial of service and rounding \
errors. Provide a proof-of-concept attack sequence for every High or Critical finding.";

/// Attribution header prepended to every report
pub fn attribution_header() -> String {
    format!(
        "> Generated by {} v{} (AI-assisted security review, verify findings before acting)\n\n",
        APP_NAME, APP_VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_identifiers() {
        assert_eq!(chain_identifier_to_id("ethereum"), Some(1));
        assert_eq!(chain_identifier_to_id(" BSC "), Some(56));
        assert_eq!(chain_identifier_to_id("8453"), Some(8453));
        assert_eq!(chain_identifier_to_id("999999"), None);
        assert_eq!(chain_identifier_to_id("dogechain"), None);
    }

    #[test]
    fn test_every_supported_chain_has_explorer() {
        for chain_id in SUPPORTED_CHAIN_IDS {
            let info = get_explorer_info(chain_id).expect("explorer info");
            assert_eq!(info.chain_id, chain_id);
            assert!(info.api_url.ends_with("/api"));
        }
    }

    #[test]
    fn test_model_lookup() {
        assert!(get_model_info(DEFAULT_MODEL).is_some());
        assert!(get_model_info("gpt-2").is_none());
    }

    #[test]
    fn test_language_fallback() {
        assert_eq!(get_language_name("zh"), "Simplified Chinese");
        assert_eq!(get_language_name("xx"), "English");
    }
}
