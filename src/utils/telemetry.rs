//! Telemetry Module
//!
//! Process-local counters for resolutions and analyses. No addresses, keys
//! or prompt content are recorded.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::models::{AnalysisState, ContractBundle};

/// Snapshot of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub resolutions: u64,
    pub resolution_failures: u64,
    pub proxies_detected: u64,
    pub partial_proxies: u64,
    pub analyses_succeeded: u64,
    pub analyses_failed: u64,
    pub analyses_cancelled: u64,
    pub inference_attempts: u64,
    pub total_resolution_ms: u64,
    pub uptime_secs: u64,
}

impl TelemetryStats {
    /// Mean resolution latency
    pub fn avg_resolution_ms(&self) -> f64 {
        if self.resolutions == 0 {
            0.0
        } else {
            self.total_resolution_ms as f64 / self.resolutions as f64
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

pub struct TelemetryCollector {
    resolutions: AtomicU64,
    resolution_failures: AtomicU64,
    proxies_detected: AtomicU64,
    partial_proxies: AtomicU64,
    analyses_succeeded: AtomicU64,
    analyses_failed: AtomicU64,
    analyses_cancelled: AtomicU64,
    inference_attempts: AtomicU64,
    total_resolution_ms: AtomicU64,
    started_at: Instant,
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            resolutions: AtomicU64::new(0),
            resolution_failures: AtomicU64::new(0),
            proxies_detected: AtomicU64::new(0),
            partial_proxies: AtomicU64::new(0),
            analyses_succeeded: AtomicU64::new(0),
            analyses_failed: AtomicU64::new(0),
            analyses_cancelled: AtomicU64::new(0),
            inference_attempts: AtomicU64::new(0),
            total_resolution_ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_resolution(&self, bundle: &ContractBundle, latency_ms: u64) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        self.total_resolution_ms.fetch_add(latency_ms, Ordering::Relaxed);
        if bundle.is_proxy {
            self.proxies_detected.fetch_add(1, Ordering::Relaxed);
        }
        if bundle.proxy_partial.is_some() {
            self.partial_proxies.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_resolution_failure(&self) {
        self.resolution_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attempt(&self) {
        self.inference_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a terminal analysis state; non-terminal states are ignored
    pub fn record_analysis(&self, state: AnalysisState) {
        if !state.is_terminal() {
            return;
        }
        let counter = match state {
            AnalysisState::Succeeded => &self.analyses_succeeded,
            AnalysisState::Cancelled => &self.analyses_cancelled,
            _ => &self.analyses_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> TelemetryStats {
        TelemetryStats {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
            proxies_detected: self.proxies_detected.load(Ordering::Relaxed),
            partial_proxies: self.partial_proxies.load(Ordering::Relaxed),
            analyses_succeeded: self.analyses_succeeded.load(Ordering::Relaxed),
            analyses_failed: self.analyses_failed.load(Ordering::Relaxed),
            analyses_cancelled: self.analyses_cancelled.load(Ordering::Relaxed),
            inference_attempts: self.inference_attempts.load(Ordering::Relaxed),
            total_resolution_ms: self.total_resolution_ms.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.resolutions,
            &self.resolution_failures,
            &self.proxies_detected,
            &self.partial_proxies,
            &self.analyses_succeeded,
            &self.analyses_failed,
            &self.analyses_cancelled,
            &self.inference_attempts,
            &self.total_resolution_ms,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
