//! Error types for the forgeloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::provider::ProviderFamily;

/// The top-level error type for all forgeloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Loop control ---
    #[error("Agent run cancelled after {iterations} provider call(s)")]
    Cancelled { iterations: u32 },

    #[error("Transcript was recorded for the {found} family, provider expects {expected}")]
    TranscriptMismatch {
        expected: ProviderFamily,
        found: ProviderFamily,
    },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The response body did not have the shape the wire family promises
    /// (no `content` array, no `choices` array, undecodable JSON).
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Could not encode request: {0}")]
    InvalidRequest(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name} — {reason}")]
    PermissionDenied { tool_name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::PermissionDenied {
            tool_name: "run_command".into(),
            reason: "path escapes workspace".into(),
        });
        assert!(err.to_string().contains("run_command"));
        assert!(err.to_string().contains("workspace"));
    }

    #[test]
    fn cancellation_is_distinct_from_provider_failure() {
        let err = Error::Cancelled { iterations: 3 };
        assert!(err.to_string().contains("cancelled"));
        assert!(!matches!(err, Error::Provider(_)));
    }

    #[test]
    fn transcript_mismatch_names_both_families() {
        let err = Error::TranscriptMismatch {
            expected: ProviderFamily::BlockContent,
            found: ProviderFamily::FunctionCall,
        };
        let text = err.to_string();
        assert!(text.contains("block_content"));
        assert!(text.contains("function_call"));
    }
}
