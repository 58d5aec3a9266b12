//! Analysis Orchestrator
//!
//! `Idle → Building → Requesting → {Succeeded, Retrying, Failed, Cancelled}`
//!
//! One inference call per attempt, at most `max_retries + 1` attempts. Only
//! transient failures (network, 429, 5xx) move to `Retrying`; everything else
//! is terminal. The cancel token races every in-flight call and every backoff
//! sleep, whichever finishes first decides the outcome.

use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::prompt::PromptBuilder;
use crate::models::{
    AnalysisReport, AnalysisState, AnalyzerConfig, AppError, AppResult, ContractBundle,
    OrchestratorSettings,
};
use crate::providers::InferenceClient;
use crate::utils::constants::{
    attribution_header, get_model_info, ModelInfo, AUDITOR_PERSONA, RETRY_JITTER_PERCENT,
};
use crate::utils::telemetry::TelemetryCollector;

/// State after one attempt finished with `outcome`
pub fn next_state(outcome: &AppResult<String>, attempt: u32, max_attempts: u32) -> AnalysisState {
    match outcome {
        Ok(_) => AnalysisState::Succeeded,
        Err(e) if e.is_cancelled() => AnalysisState::Cancelled,
        Err(e) if e.code.is_retryable() && attempt < max_attempts => AnalysisState::Retrying,
        Err(_) => AnalysisState::Failed,
    }
}

/// Exponential backoff with ±20% jitter before attempt `attempt + 1`
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base_ms = base.as_millis() as u64;
    let capped = base_ms.saturating_mul(2_u64.pow(exponent)).min(max.as_millis() as u64);

    let jitter_range = (capped * RETRY_JITTER_PERCENT) / 100;
    let jitter: i64 = rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
    Duration::from_millis((capped as i64 + jitter).max(0) as u64)
}

/// Strip a code fence wrapping the whole body and prepend the attribution header
pub fn normalize_markdown(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = unwrap_fence(trimmed).unwrap_or(trimmed);
    format!("{}{}", attribution_header(), body)
}

/// Only bare or markdown-tagged fences; a leading ```solidity block is content
fn unwrap_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let (tag, inner) = rest.split_once('\n')?;
    if !matches!(tag.trim().to_lowercase().as_str(), "" | "markdown" | "md") {
        return None;
    }
    let inner = inner.trim_end().strip_suffix("```")?;
    fences_balanced(inner).then(|| inner.trim())
}

/// Inner blocks must open with a language tag and close with a bare fence;
/// a bare fence outside a block means the outer fence closed early
fn fences_balanced(inner: &str) -> bool {
    let mut open = false;
    for line in inner.lines() {
        let Some(tag) = line.trim().strip_prefix("```") else {
            continue;
        };
        match (open, tag.trim().is_empty()) {
            (true, true) => open = false,
            (false, false) => open = true,
            _ => return false,
        }
    }
    !open
}

/// Inference key and model must be configured; neither is ever defaulted
pub fn check_preconditions(config: &AnalyzerConfig) -> AppResult<(&str, ModelInfo)> {
    let api_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::missing_api_key("AI_API_KEY"))?;
    let model = get_model_info(&config.selected_model)
        .ok_or_else(|| AppError::invalid_model(&config.selected_model))?;
    Ok((api_key, model))
}

fn enter(state: &mut AnalysisState, next: AnalysisState) {
    debug!("Analysis state {:?} → {:?}", state, next);
    *state = next;
}

pub struct Orchestrator {
    inference: InferenceClient,
    settings: OrchestratorSettings,
    telemetry: Arc<TelemetryCollector>,
}

impl Orchestrator {
    pub fn new(settings: OrchestratorSettings) -> AppResult<Self> {
        Self::with_telemetry(settings, Arc::new(TelemetryCollector::new()))
    }

    pub fn with_telemetry(
        settings: OrchestratorSettings,
        telemetry: Arc<TelemetryCollector>,
    ) -> AppResult<Self> {
        let inference = InferenceClient::new(&settings.endpoint, settings.request_timeout)?;
        Ok(Self {
            inference,
            settings,
            telemetry,
        })
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Run one analysis of `bundle` under `config`
    pub async fn analyze(
        &self,
        bundle: &ContractBundle,
        config: &AnalyzerConfig,
        cancel: CancellationToken,
    ) -> AppResult<AnalysisReport> {
        let result = self.run(bundle, config, cancel).await;
        match &result {
            Ok(report) => info!(
                "✅ Analysis of {} done in {}ms ({} attempt(s))",
                bundle.contract_name, report.elapsed_ms, report.attempts
            ),
            Err(e) if e.is_cancelled() => info!("🛑 Analysis of {} cancelled", bundle.contract_name),
            Err(e) => error!("❌ Analysis of {} failed: {}", bundle.contract_name, e),
        }
        result
    }

    async fn run(
        &self,
        bundle: &ContractBundle,
        config: &AnalyzerConfig,
        cancel: CancellationToken,
    ) -> AppResult<AnalysisReport> {
        let start = Instant::now();
        let mut state = AnalysisState::Idle;

        if cancel.is_cancelled() {
            self.telemetry.record_analysis(AnalysisState::Cancelled);
            return Err(AppError::cancelled());
        }

        let preconditions = check_preconditions(config);
        let (api_key, model) = match preconditions {
            Ok(ok) => ok,
            Err(e) => {
                self.telemetry.record_analysis(AnalysisState::Failed);
                return Err(e);
            }
        };

        enter(&mut state, AnalysisState::Building);
        let request = PromptBuilder::for_model(&model).build(bundle, config);
        info!(
            "🧠 Analyzing {} with {} ({} files, {} omitted)",
            bundle.contract_name,
            model.display_name,
            request.included_paths.len(),
            request.omitted_paths.len()
        );

        let max_attempts = self.settings.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                enter(&mut state, AnalysisState::Cancelled);
                self.telemetry.record_analysis(state);
                return Err(AppError::cancelled());
            }

            attempt += 1;
            enter(&mut state, AnalysisState::Requesting);
            self.telemetry.record_attempt();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AppError::cancelled()),
                result = self.inference.complete(api_key, model.id, AUDITOR_PERSONA, &request.prompt) => result,
            };

            enter(&mut state, next_state(&outcome, attempt, max_attempts));
            match (state, outcome) {
                (AnalysisState::Succeeded, Ok(completion)) => {
                    self.telemetry.record_analysis(state);
                    return Ok(AnalysisReport {
                        markdown: normalize_markdown(&completion),
                        model: model.id.to_string(),
                        attempts: attempt,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
                (AnalysisState::Retrying, Err(e)) => {
                    let delay = backoff_delay(attempt, self.settings.base_backoff, self.settings.max_backoff);
                    warn!(
                        "⏳ Attempt {}/{} failed ({}), retrying in {}ms",
                        attempt,
                        max_attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            enter(&mut state, AnalysisState::Cancelled);
                            self.telemetry.record_analysis(state);
                            return Err(AppError::cancelled());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                (_, Err(e)) => {
                    self.telemetry.record_analysis(state);
                    return Err(e);
                }
                (_, Ok(_)) => {
                    self.telemetry.record_analysis(AnalysisState::Failed);
                    return Err(AppError::malformed_response("Unexpected analysis state"));
                }
            }
        }
    }
}
