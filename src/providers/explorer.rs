//! Explorer API Client - Etherscan-compatible block explorers
//!
//! Issues `module`/`action`/`address`/`apikey` GET queries and handles the
//! v1 → v2 migration of the Etherscan family: when a v1 endpoint answers
//! that it is deprecated, the same query is re-issued once against the v2
//! shape (`/v2/api`) with `chainid` appended.
//!
//! No retries on transport errors at this layer: resolution latency stays
//! predictable and the caller sees the failure directly.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{
    AppError, AppResult, ErrorCode, ExplorerContext, ExplorerRequest, ExplorerResult,
    ExplorerSourceEntry,
};
use crate::utils::constants::{DEFAULT_EXPLORER_TIMEOUT_SECS, USER_AGENT as USER_AGENT_CONST};

/// Heuristic over human-readable text: explorers expose no structured code
/// for "this v1 endpoint is gone". Update here only.
pub fn is_v1_deprecated(result: &ExplorerResult) -> bool {
    if result.is_success() {
        return false;
    }
    let text = result.combined_text().to_lowercase();
    text.contains("deprecated") && text.contains("v1")
}

/// Stateless explorer client
#[derive(Clone)]
pub struct ExplorerClient {
    client: reqwest::Client,
}

impl ExplorerClient {
    /// Create a client with default headers and timeout
    pub fn new() -> AppResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_EXPLORER_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::Unknown, "Failed to build HTTP client", e))?;

        Ok(Self { client })
    }

    /// Query the explorer, upgrading to v2 at most once
    pub async fn fetch(
        &self,
        ctx: &ExplorerContext,
        module: &str,
        action: &str,
        address: &str,
    ) -> AppResult<ExplorerResult> {
        let request = ExplorerRequest::new(
            &ctx.base_url,
            module,
            action,
            address,
            ctx.effective_api_key(),
        );

        let result = self.execute(&request).await?;
        if !is_v1_deprecated(&result) {
            return Ok(result);
        }

        let upgraded = request.upgraded_to_v2(ctx.chain_id);
        info!(
            "🔄 Explorer v1 deprecated on {}, retrying via {}",
            ctx.chain_name,
            upgraded.base_url()
        );
        self.execute(&upgraded).await
    }

    /// `contract/getsourcecode`, first entry of the result array.
    /// Unverified contracts are an error.
    pub async fn get_source_code(
        &self,
        ctx: &ExplorerContext,
        address: &str,
    ) -> AppResult<ExplorerSourceEntry> {
        let result = self.fetch(ctx, "contract", "getsourcecode", address).await?;
        if !result.is_success() {
            return Err(AppError::explorer_error(
                format!("Explorer rejected getsourcecode for {}", address),
                result.diagnostic(),
            ));
        }

        let first = result
            .result
            .as_array()
            .and_then(|entries| entries.first())
            .cloned()
            .ok_or_else(|| {
                AppError::explorer_invalid_response("getsourcecode result is not a non-empty array")
                    .with_explorer(result.diagnostic())
            })?;

        let entry: ExplorerSourceEntry = serde_json::from_value(first).map_err(|e| {
            AppError::with_source(
                ErrorCode::ExplorerInvalidResponse,
                "getsourcecode entry has an unexpected shape",
                e,
            )
            .with_explorer(result.diagnostic())
        })?;

        if !entry.is_verified() {
            return Err(AppError::not_verified(address).with_explorer(result.diagnostic()));
        }

        Ok(entry)
    }

    /// `contract/getabi`, raw envelope (the ABI fetcher decides what to keep)
    pub async fn get_abi(&self, ctx: &ExplorerContext, address: &str) -> AppResult<ExplorerResult> {
        self.fetch(ctx, "contract", "getabi", address).await
    }

    /// Single GET, no retry
    async fn execute(&self, request: &ExplorerRequest) -> AppResult<ExplorerResult> {
        debug!(
            url = %request.base_url(),
            action = request.param("action").unwrap_or_default(),
            address = request.param("address").unwrap_or_default(),
            version = ?request.version(),
            "Explorer request"
        );

        let response = self
            .client
            .get(request.base_url())
            .query(request.params())
            .send()
            .await
            .map_err(|e| {
                warn!("⚠️ Explorer unreachable at {}: {}", request.base_url(), e);
                AppError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(AppError::from)?;

        let result = ExplorerResult::from_body(&body);
        if !status.is_success() {
            debug!(http_status = %status, message = %result.message, "Explorer non-2xx");
        }
        Ok(result)
    }
}
