//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so logs and API clients can
//! tell resolution problems, configuration problems, temporary failures and
//! user cancellation apart.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - EXPLORER_xxx: explorer / source resolution errors
//! - AI_xxx: analysis (inference) errors
//! - CFG_xxx: configuration errors

use serde::Serialize;
use std::fmt;

/// Longest explorer `result` excerpt shown in error text
const MAX_DISPLAY_RAW_CHARS: usize = 200;

/// What the explorer said when it answered with a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplorerDiagnostic {
    pub status: String,
    pub message: String,
    /// Raw `result` payload, stringified
    pub raw: String,
}

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Explorer status/message, when the failure came from an explorer answer
    pub explorer: Option<ExplorerDiagnostic>,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            explorer: None,
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            explorer: None,
            source: Some(Box::new(source)),
        }
    }

    /// Attach the explorer's own diagnostic
    pub fn with_explorer(mut self, diagnostic: ExplorerDiagnostic) -> Self {
        self.explorer = Some(diagnostic);
        self
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// User-facing category
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// True when the user stopped the operation on purpose
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::AnalysisCancelled
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if let Some(diag) = &self.explorer {
            write!(f, " (explorer status {}: {}", diag.status, diag.message)?;
            let raw = diag.raw.trim();
            if !raw.is_empty() && raw != diag.message {
                let excerpt: String = raw.chars().take(MAX_DISPLAY_RAW_CHARS).collect();
                write!(f, " - {}", excerpt)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// How a failure should be presented to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Source could not be resolved (explorer said no, or was unreachable)
    Resolution,
    /// Fix your key / model / request
    Configuration,
    /// Retry later
    Temporary,
    /// Intentional stop, not an error
    Cancelled,
    /// Bug or unexpected state
    Internal,
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Explorer / Resolution Errors
    // ============================================
    /// Explorer could not be reached (network failure)
    ExplorerUnreachable,
    /// Explorer answered with status "0"
    ExplorerError,
    /// Explorer answered with an unexpected shape
    ExplorerInvalidResponse,
    /// Contract source is not verified
    ContractNotVerified,
    /// Address is not a valid 20-byte hex address
    InvalidAddress,

    // ============================================
    // Analysis Errors
    // ============================================
    /// Inference endpoint rejected the API key
    AnalysisUnauthorized,
    /// Model is unknown locally or rejected by the endpoint
    AnalysisInvalidModel,
    /// Inference endpoint rejected the request (other 4xx)
    AnalysisBadRequest,
    /// Response decoded to an unrecognized shape or empty completion
    AnalysisMalformedResponse,
    /// Network failure, 5xx or rate limit
    AnalysisTransient,
    /// User cancelled the analysis
    AnalysisCancelled,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Unknown chain identifier
    ConfigUnsupportedChain,
    /// Missing API key
    ConfigMissingApiKey,

    // ============================================
    // API Errors
    // ============================================
    /// Invalid request format
    ApiBadRequest,

    // ============================================
    // Generic Errors
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplorerUnreachable => "EXPLORER_UNREACHABLE",
            Self::ExplorerError => "EXPLORER_ERROR",
            Self::ExplorerInvalidResponse => "EXPLORER_INVALID_RESPONSE",
            Self::ContractNotVerified => "CONTRACT_NOT_VERIFIED",
            Self::InvalidAddress => "INVALID_ADDRESS",

            Self::AnalysisUnauthorized => "AI_UNAUTHORIZED",
            Self::AnalysisInvalidModel => "AI_INVALID_MODEL",
            Self::AnalysisBadRequest => "AI_BAD_REQUEST",
            Self::AnalysisMalformedResponse => "AI_MALFORMED_RESPONSE",
            Self::AnalysisTransient => "AI_TRANSIENT",
            Self::AnalysisCancelled => "AI_CANCELLED",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigUnsupportedChain => "CFG_UNSUPPORTED_CHAIN",
            Self::ConfigMissingApiKey => "CFG_MISSING_API_KEY",

            Self::ApiBadRequest => "API_BAD_REQUEST",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// User-facing category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ExplorerUnreachable
            | Self::ExplorerError
            | Self::ExplorerInvalidResponse
            | Self::ContractNotVerified => ErrorCategory::Resolution,
            Self::InvalidAddress
            | Self::AnalysisUnauthorized
            | Self::AnalysisInvalidModel
            | Self::AnalysisBadRequest
            | Self::ConfigInvalidValue
            | Self::ConfigUnsupportedChain
            | Self::ConfigMissingApiKey
            | Self::ApiBadRequest => ErrorCategory::Configuration,
            Self::AnalysisMalformedResponse | Self::AnalysisTransient => ErrorCategory::Temporary,
            Self::AnalysisCancelled => ErrorCategory::Cancelled,
            Self::Unknown => ErrorCategory::Internal,
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiBadRequest
            | Self::InvalidAddress
            | Self::ConfigInvalidValue
            | Self::ConfigUnsupportedChain
            | Self::AnalysisInvalidModel
            | Self::AnalysisBadRequest => 400,
            Self::AnalysisUnauthorized | Self::ConfigMissingApiKey => 401,
            Self::ContractNotVerified => 404,
            // nginx "client closed request"
            Self::AnalysisCancelled => 499,
            Self::ExplorerUnreachable
            | Self::ExplorerError
            | Self::ExplorerInvalidResponse
            | Self::AnalysisMalformedResponse
            | Self::AnalysisTransient => 502,
            Self::Unknown => 500,
        }
    }

    /// Check if error is retryable by the analysis loop
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AnalysisTransient)
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Explorer answered with a failure status
    pub fn explorer_error(msg: impl Into<String>, diagnostic: ExplorerDiagnostic) -> Self {
        Self::new(ErrorCode::ExplorerError, msg).with_explorer(diagnostic)
    }

    /// Explorer answered with an unexpected shape
    pub fn explorer_invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExplorerInvalidResponse, msg)
    }

    /// Contract not verified
    pub fn not_verified(address: &str) -> Self {
        Self::new(
            ErrorCode::ContractNotVerified,
            format!("Contract source code not verified: {}", address),
        )
    }

    /// Invalid contract address
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    /// Unsupported chain
    pub fn unsupported_chain(identifier: &str) -> Self {
        Self::new(
            ErrorCode::ConfigUnsupportedChain,
            format!("Unsupported chain: {}", identifier),
        )
    }

    /// Missing API key
    pub fn missing_api_key(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingApiKey,
            format!("Missing API key: {}", key_name),
        )
    }

    /// Model not in the registry or rejected by the endpoint
    pub fn invalid_model(model: &str) -> Self {
        Self::new(
            ErrorCode::AnalysisInvalidModel,
            format!("Invalid model: {}", model),
        )
    }

    /// Transient inference failure
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AnalysisTransient, msg)
    }

    /// Malformed inference response
    pub fn malformed_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AnalysisMalformedResponse, msg)
    }

    /// Analysis cancelled by the caller
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::AnalysisCancelled, "Analysis cancelled")
    }

    /// API bad request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::with_source(ErrorCode::ExplorerUnreachable, "Request timeout", err)
        } else if err.is_connect() {
            Self::with_source(ErrorCode::ExplorerUnreachable, "Connection failed", err)
        } else {
            let message = err.to_string();
            Self::with_source(ErrorCode::ExplorerUnreachable, message, err)
        }
    }
}
