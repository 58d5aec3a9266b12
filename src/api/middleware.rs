//! API Middleware (Auth, Rate Limiting, Logging)

use axum::{
    extract::{Json, Request},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::{ApiError, ApiResponse};
use crate::utils::constants::{RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW_SECS};

type Rejection = (StatusCode, Json<ApiResponse<()>>);

fn reject(status: StatusCode, error: ApiError) -> Rejection {
    (status, Json(ApiResponse::error(error, 0.0)))
}

/// Env var holding comma-separated server access keys
pub const SERVER_KEYS_ENV: &str = "RUSTER_API_KEYS";

/// Rate limiter configuration
pub struct RateLimitConfig {
    /// Requests per window
    pub requests_per_window: u32,
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: RATE_LIMIT_REQUESTS,
            window_duration: Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        }
    }
}

/// Fixed-window in-memory rate limiter, keyed by access key or client IP
pub struct RateLimiter {
    requests: DashMap<String, (u32, Instant)>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            requests: DashMap::new(),
            config,
        }
    }

    /// Returns (allowed, remaining, reset_seconds)
    pub fn check(&self, key: &str) -> (bool, u32, u64) {
        let now = Instant::now();
        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) > self.config.window_duration {
            entry.0 = 0;
            entry.1 = now;
        }

        let reset_secs = self
            .config
            .window_duration
            .saturating_sub(now.duration_since(entry.1))
            .as_secs();

        if entry.0 >= self.config.requests_per_window {
            return (false, 0, reset_secs);
        }

        entry.0 += 1;
        (true, self.config.requests_per_window - entry.0, reset_secs)
    }

    /// Drop entries idle for two windows; returns how many were removed
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests
            .retain(|_, (_, timestamp)| now.duration_since(*timestamp) < self.config.window_duration * 2);
        before - self.requests.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

lazy_static::lazy_static! {
    pub static ref RATE_LIMITER: Arc<RateLimiter> = Arc::new(RateLimiter::default());
    /// Empty means the server is open
    static ref SERVER_KEYS: Vec<String> = std::env::var(SERVER_KEYS_ENV)
        .unwrap_or_default()
        .split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
}

/// Periodically purge idle rate-limit entries
pub fn start_cleanup_task() {
    tokio::spawn(async {
        let mut interval = tokio::time::interval(Duration::from_secs(RATE_LIMIT_WINDOW_SECS));
        loop {
            interval.tick().await;
            let removed = RATE_LIMITER.cleanup();
            if removed > 0 {
                debug!("🧹 Rate limiter cleanup: {} idle entries removed", removed);
            }
        }
    });
}

fn is_health_path(path: &str) -> bool {
    path == "/health" || path == "/v1/health"
}

fn access_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-api-key").and_then(|v| v.to_str().ok())
}

/// Check a key against the configured server keys
pub fn validate_api_key(key: &str, allowed: &[String]) -> bool {
    allowed.is_empty() || allowed.iter().any(|k| k == key)
}

/// Access key authentication; open when `RUSTER_API_KEYS` is unset
pub async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    if is_health_path(request.uri().path()) || SERVER_KEYS.is_empty() {
        return Ok(next.run(request).await);
    }

    match access_key(&headers) {
        Some(key) if validate_api_key(key, &SERVER_KEYS) => Ok(next.run(request).await),
        Some(_) => {
            warn!("Invalid access key attempted");
            Err(reject(StatusCode::UNAUTHORIZED, ApiError::unauthorized()))
        }
        None => Err(reject(StatusCode::UNAUTHORIZED, ApiError::unauthorized())),
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    if is_health_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let rate_key = access_key(&headers)
        .or_else(|| headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()))
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
        .to_string();

    let (allowed, remaining, reset) = RATE_LIMITER.check(&rate_key);
    if !allowed {
        warn!(retry_after = reset, "Rate limit exceeded");
        return Err(reject(StatusCode::TOO_MANY_REQUESTS, ApiError::rate_limited(reset)));
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Remaining", remaining.into());
    headers.insert("X-RateLimit-Reset", reset.into());

    Ok(response)
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        latency_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_blocks_after_window_budget() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 2,
            window_duration: Duration::from_secs(60),
        });

        assert_eq!(limiter.check("client").0, true);
        let (allowed, remaining, _) = limiter.check("client");
        assert!(allowed);
        assert_eq!(remaining, 0);
        assert!(!limiter.check("client").0);

        // Other clients are unaffected
        assert!(limiter.check("other").0);
    }

    #[test]
    fn test_rate_limiter_cleanup() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 5,
            window_duration: Duration::from_millis(1),
        });
        limiter.check("a");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(limiter.cleanup(), 1);
    }

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("anything", &[]));
        let allowed = vec!["sk_live_1".to_string()];
        assert!(validate_api_key("sk_live_1", &allowed));
        assert!(!validate_api_key("sk_live_2", &allowed));
    }
}
