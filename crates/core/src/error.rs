//! Error types for the webhound domain.
//!
//! Uses `thiserror`; each bounded context has its own enum. Tool failures
//! are recoverable (absorbed into the conversation), provider failures are
//! fatal to a run, session errors map to client-visible HTTP statuses.

use thiserror::Error;

/// The top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to the model provider. Fatal to the run that hit them.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures executing a tool. Recoverable — recorded as the tool's result
/// payload so the model can adapt on the next turn.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// Session-store errors, surfaced to the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Chat not found")]
    NotFound,

    #[error("Chat is still processing")]
    AlreadyProcessing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_status() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_names_the_tool() {
        let err = ToolError::ExecutionFailed {
            tool_name: "download_file".into(),
            reason: "connection reset".into(),
        };
        assert!(err.to_string().contains("download_file"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn session_errors_are_distinct() {
        assert_ne!(SessionError::NotFound, SessionError::AlreadyProcessing);
        assert_eq!(
            SessionError::AlreadyProcessing.to_string(),
            "Chat is still processing"
        );
    }
}
