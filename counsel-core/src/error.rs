//! Error types for the Counsel engine.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering retrieval, completion streaming, tool dispatch, session storage,
//! and configuration. Most of these are recovered inside a turn; only
//! [`SessionError`] is allowed to reach the caller of a turn.

use std::path::PathBuf;

/// Top-level error type for the Counsel core library.
#[derive(Debug, thiserror::Error)]
pub enum CounselError {
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the document index and embedding collaborators.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Index request failed: {message}")]
    Request { message: String },

    #[error("Index returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Index response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Index not configured: {field}")]
    NotConfigured { field: String },
}

/// Errors from the streaming completion transport.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Streaming error: {message}")]
    Streaming { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Completion cancelled")]
    Cancelled,
}

/// Errors from action handlers. The router converts every one of these into a
/// failed `ToolResult`; none escapes a turn.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown function: {name}")]
    NotFound { name: String },

    #[error("Handler already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Invalid arguments for '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("'{name}' failed: {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("'{name}' timed out after {timeout_secs}s; the action may or may not have completed")]
    Timeout { name: String, timeout_secs: u64 },

    #[error("'{name}' handler panicked: {message}")]
    Panicked { name: String, message: String },
}

/// Errors from the session store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session store lock poisoned for session {session_id}")]
    Poisoned { session_id: String },

    #[error("Session store unavailable: {message}")]
    Unavailable { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `CounselError`.
pub type Result<T> = std::result::Result<T, CounselError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_completion() {
        let err = CounselError::Completion(CompletionError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "Completion error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_tool_not_found() {
        let err = ToolError::NotFound {
            name: "launch_rocket".into(),
        };
        assert_eq!(err.to_string(), "Unknown function: launch_rocket");
    }

    #[test]
    fn test_tool_timeout_mentions_partial_state() {
        let err = ToolError::Timeout {
            name: "create_legal_case".into(),
            timeout_secs: 30,
        };
        assert!(err.to_string().contains("may or may not have completed"));
    }

    #[test]
    fn test_error_from_session() {
        let err: CounselError = SessionError::Poisoned {
            session_id: "abc".into(),
        }
        .into();
        assert!(matches!(err, CounselError::Session(_)));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_error_from_retrieval() {
        let err: CounselError = RetrievalError::Status {
            status: 503,
            message: "busy".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Retrieval error: Index returned HTTP 503: busy");
    }
}
