//! Unified Error Type System
//!
//! Centralized error types for the analysis pipeline.
//! Every rejection carries enough structure (kind, usage numbers, token
//! counts) for a caller to decide whether to retry, wait, or shorten input.
//!
//! ## Error Kinds
//!
//! - **TokenizerUnavailable**: BPE data could not be loaded (retry next call)
//! - **InputTooLarge**: prompt exceeds the hard token limit (shorten input)
//! - **RateLimited / QuotaExceeded**: gate rejections (wait, then retry)
//! - **Upstream**: analysis service failure (surfaced, never retried here)
//!
//! Malformed service responses are not errors: the response validator
//! absorbs them into a zero-value result.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

// =============================================================================
// Error Kinds
// =============================================================================

/// Coarse classification used for caller-side retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TokenizerUnavailable,
    InputTooLarge,
    EmptyPrompt,
    RateLimited,
    QuotaExceeded,
    Upstream,
    AnalysisFailed,
    Timeout,
    Cancelled,
    Config,
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenizerUnavailable => write!(f, "TOKENIZER_UNAVAILABLE"),
            Self::InputTooLarge => write!(f, "INPUT_TOO_LARGE"),
            Self::EmptyPrompt => write!(f, "EMPTY_PROMPT"),
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::QuotaExceeded => write!(f, "QUOTA_EXCEEDED"),
            Self::Upstream => write!(f, "UPSTREAM"),
            Self::AnalysisFailed => write!(f, "ANALYSIS_FAILED"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Config => write!(f, "CONFIG"),
            Self::Storage => write!(f, "STORAGE"),
        }
    }
}

impl ErrorKind {
    /// Whether the same request may succeed if issued again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TokenizerUnavailable
                | Self::RateLimited
                | Self::QuotaExceeded
                | Self::Upstream
                | Self::AnalysisFailed
                | Self::Timeout
        )
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum LensError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Tokenizer / Planner Errors
    // -------------------------------------------------------------------------
    #[error("Tokenizer unavailable: {0}")]
    TokenizerUnavailable(String),

    #[error("Input too large: {token_count} tokens (limit {limit})")]
    InputTooLarge { token_count: usize, limit: usize },

    #[error("Prompt is empty")]
    EmptyPrompt,

    // -------------------------------------------------------------------------
    // Gate Errors
    // -------------------------------------------------------------------------
    #[error("Rate limited: '{identity}' may retry in {retry_after:?}")]
    RateLimited {
        identity: String,
        retry_after: Duration,
    },

    #[error("Daily quota exceeded: {usage}/{limit} requests used")]
    QuotaExceeded { usage: u32, limit: u32 },

    // -------------------------------------------------------------------------
    // Analysis Errors
    // -------------------------------------------------------------------------
    /// Non-2xx status or transport failure from the analysis service
    #[error("Analysis service error{}: {detail}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Upstream { status: Option<u16>, detail: String },

    /// A chunk request failed; the whole aggregation was aborted
    #[error("Analysis failed at chunk {}/{total_chunks} after {elapsed:?}: {source}", .chunk_index + 1)]
    AnalysisFailed {
        chunk_index: usize,
        total_chunks: usize,
        elapsed: Duration,
        #[source]
        source: Box<LensError>,
    },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, LensError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl LensError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an upstream error from an HTTP status and response body
    pub fn upstream(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            detail: detail.into(),
        }
    }

    /// Classify this error for retry decisions
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenizerUnavailable(_) => ErrorKind::TokenizerUnavailable,
            Self::InputTooLarge { .. } => ErrorKind::InputTooLarge,
            Self::EmptyPrompt => ErrorKind::EmptyPrompt,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::AnalysisFailed { .. } => ErrorKind::AnalysisFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Database(_) | Self::Json(_) | Self::Storage(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Check if this error is recoverable by retrying later
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Recommended wait before retrying, when the error knows one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Structured, serializable form of this error for callers
    pub fn report(&self) -> ErrorReport {
        let detail = match self {
            Self::InputTooLarge { token_count, limit } => {
                json!({ "tokenCount": token_count, "limit": limit })
            }
            Self::RateLimited {
                identity,
                retry_after,
            } => json!({
                "identity": identity,
                "retryAfterMs": retry_after.as_millis() as u64,
            }),
            Self::QuotaExceeded { usage, limit } => {
                json!({ "usage": usage, "limit": limit, "blocked": true })
            }
            Self::Upstream { status, detail } => json!({ "status": status, "body": detail }),
            Self::AnalysisFailed {
                chunk_index,
                total_chunks,
                elapsed,
                source,
            } => json!({
                "chunkIndex": chunk_index,
                "totalChunks": total_chunks,
                "elapsedMs": elapsed.as_millis() as u64,
                "cause": source.kind(),
            }),
            Self::Timeout { duration, .. } => {
                json!({ "timeoutMs": duration.as_millis() as u64 })
            }
            _ => Value::Null,
        };

        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            retryable: self.is_retryable(),
            detail,
        }
    }
}

/// Caller-facing error result
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

impl From<r2d2::Error> for LensError {
    fn from(err: r2d2::Error) -> Self {
        LensError::Storage(format!("Connection pool error: {}", err))
    }
}

impl From<tokio::task::JoinError> for LensError {
    fn from(err: tokio::task::JoinError) -> Self {
        LensError::Storage(format!("Background task failed: {}", err))
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| LensError::Storage(format!("{}: {}", context.into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
