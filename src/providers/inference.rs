//! Inference Client - OpenAI-compatible chat completions
//!
//! One call = one `POST {endpoint}/chat/completions`. Failures are
//! classified here; retry policy lives in the orchestrator.
//!
//! | Response | Code |
//! |---|---|
//! | network error, 5xx, 429 | `AnalysisTransient` |
//! | 401, 403 | `AnalysisUnauthorized` |
//! | 404, 400/422 mentioning the model | `AnalysisInvalidModel` |
//! | other 4xx | `AnalysisBadRequest` |
//! | 2xx without a non-empty completion | `AnalysisMalformedResponse` |

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::models::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{APP_NAME, USER_AGENT as USER_AGENT_CONST};

/// Longest body excerpt kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Map an HTTP failure status (and its body) to an analysis error code
pub fn classify_status(status: u16, body: &str) -> ErrorCode {
    match status {
        429 | 500..=599 => ErrorCode::AnalysisTransient,
        401 | 403 => ErrorCode::AnalysisUnauthorized,
        404 => ErrorCode::AnalysisInvalidModel,
        400 | 422 if body.to_lowercase().contains("model") => ErrorCode::AnalysisInvalidModel,
        400..=499 => ErrorCode::AnalysisBadRequest,
        _ => ErrorCode::AnalysisTransient,
    }
}

/// Extract the completion text from a decoded 2xx body
pub fn extract_completion(body: &str) -> AppResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        AppError::with_source(
            ErrorCode::AnalysisMalformedResponse,
            "Inference response is not valid JSON",
            e,
        )
    })?;

    // Some gateways answer 200 with an embedded error object
    if let Some(error) = parsed.error {
        let code = error
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .map(|c| classify_status(c, &error.to_string()))
            .unwrap_or(ErrorCode::AnalysisMalformedResponse);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("embedded error")
            .to_string();
        return Err(AppError::new(code, message));
    }

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AppError::malformed_response("Inference response has no completion text"))
}

fn excerpt(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Chat completions client
#[derive(Clone)]
pub struct InferenceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl InferenceClient {
    pub fn new(endpoint: &str, timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert("X-Title", HeaderValue::from_static(APP_NAME));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::Unknown, "Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    /// Issue one completion request
    pub async fn complete(
        &self,
        api_key: &str,
        model: &str,
        system: &str,
        user: &str,
    ) -> AppResult<String> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorCode::AnalysisTransient, "Inference request failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::with_source(ErrorCode::AnalysisTransient, "Inference body read failed", e))?;

        debug!(http_status = %status, bytes = body.len(), "Inference response");

        if !status.is_success() {
            let code = classify_status(status.as_u16(), &body);
            return Err(AppError::new(
                code,
                format!("Inference endpoint returned {}: {}", status, excerpt(&body)),
            ));
        }

        extract_completion(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(500, ""), ErrorCode::AnalysisTransient);
        assert_eq!(classify_status(503, ""), ErrorCode::AnalysisTransient);
        assert_eq!(classify_status(429, ""), ErrorCode::AnalysisTransient);
        assert_eq!(classify_status(401, ""), ErrorCode::AnalysisUnauthorized);
        assert_eq!(classify_status(403, ""), ErrorCode::AnalysisUnauthorized);
        assert_eq!(classify_status(404, ""), ErrorCode::AnalysisInvalidModel);
        assert_eq!(
            classify_status(400, r#"{"error":"foo/bar is not a valid model ID"}"#),
            ErrorCode::AnalysisInvalidModel
        );
        assert_eq!(classify_status(400, "context too long"), ErrorCode::AnalysisBadRequest);
        assert_eq!(classify_status(413, ""), ErrorCode::AnalysisBadRequest);
    }

    #[test]
    fn test_extract_completion() {
        let body = r##"{"choices":[{"message":{"role":"assistant","content":"# Report"}}]}"##;
        assert_eq!(extract_completion(body).unwrap(), "# Report");
    }

    #[test]
    fn test_empty_completion_is_malformed() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"   "}}]}"#;
        let err = extract_completion(body).unwrap_err();
        assert_eq!(err.code, ErrorCode::AnalysisMalformedResponse);

        let err = extract_completion(r#"{"choices":[]}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::AnalysisMalformedResponse);

        let err = extract_completion("not json").unwrap_err();
        assert_eq!(err.code, ErrorCode::AnalysisMalformedResponse);
    }

    #[test]
    fn test_embedded_error_is_classified() {
        let body = r#"{"error":{"code":401,"message":"No auth credentials found"}}"#;
        let err = extract_completion(body).unwrap_err();
        assert_eq!(err.code, ErrorCode::AnalysisUnauthorized);

        let body = r#"{"error":{"code":502,"message":"Provider returned error"}}"#;
        let err = extract_completion(body).unwrap_err();
        assert_eq!(err.code, ErrorCode::AnalysisTransient);
    }

    #[test]
    fn test_embedded_error_code_out_of_range_is_malformed() {
        // 65937 would wrap to 401 if narrowed
        let body = r#"{"error":{"code":65937,"message":"gateway failure"}}"#;
        let err = extract_completion(body).unwrap_err();
        assert_eq!(err.code, ErrorCode::AnalysisMalformedResponse);
    }
}
