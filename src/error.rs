// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the Parley session adapter.
//!
//! This module provides strongly-typed errors for different parts of the crate,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error propagation.

use thiserror::Error;

/// Errors raised by a transport while talking to the completion service.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Response parsing error: {0}")]
    ParseError(String),

    #[error("Streaming error: {0}")]
    StreamError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// The transport observed the generation's cancellation token.
    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Create an API error with status code.
    pub fn api(message: impl Into<String>, status_code: u16) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Check if this error is retryable.
    ///
    /// The adapter never retries on its own; this is advice for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::NetworkError(_) | Self::Timeout(_)
        )
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Check if this error only reports a caller-requested abort.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A reassembled tool-call argument payload that is not valid JSON.
///
/// Local to one accumulator entry: siblings in the same turn still dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid arguments for tool call #{index} ({name}, id {id}): {message}")]
pub struct ToolArgumentParseError {
    /// Fragment index of the entry within its turn.
    pub index: u32,
    /// Tool-call id as reported by the provider (may be empty).
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Parser diagnostic.
    pub message: String,
    /// The raw reassembled payload.
    pub raw_arguments: String,
}

/// Errors returned by [`ChatSession`](crate::session::ChatSession) operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] ProviderError),

    #[error("A generation is already in progress")]
    GenerationInProgress,

    #[error("Tool result references unknown tool call: {0}")]
    UnknownToolCall(String),

    #[error("Tool result could not be serialized: {0}")]
    InvalidToolResult(String),
}

impl SessionError {
    /// Check if the underlying transport error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    /// Create an invalid value error for a named field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_retryable() {
        assert!(ProviderError::RateLimited("wait 1s".to_string()).is_retryable());
        assert!(ProviderError::NetworkError("reset".to_string()).is_retryable());
        assert!(ProviderError::Timeout(30000).is_retryable());
        assert!(!ProviderError::AuthError("invalid key".to_string()).is_retryable());
        assert!(!ProviderError::Cancelled.is_retryable());
    }

    #[test]
    fn test_provider_error_api() {
        let err = ProviderError::api("Bad request", 400);
        match err {
            ProviderError::ApiError { message, status_code } => {
                assert_eq!(message, "Bad request");
                assert_eq!(status_code, Some(400));
            }
            _ => panic!("Expected ApiError"),
        }
    }

    #[test]
    fn test_cancellation_is_not_a_failure_kind() {
        assert!(ProviderError::Cancelled.is_cancellation());
        assert!(!ProviderError::StreamError("eof".to_string()).is_cancellation());
    }

    #[test]
    fn test_session_error_from_provider() {
        let err: SessionError = ProviderError::NetworkError("down".to_string()).into();
        assert!(matches!(err, SessionError::Transport(_)));
        assert!(err.is_retryable());
        assert!(!SessionError::GenerationInProgress.is_retryable());
    }

    #[test]
    fn test_tool_argument_error_display() {
        let err = ToolArgumentParseError {
            index: 1,
            id: "call_9".to_string(),
            name: "search".to_string(),
            message: "EOF while parsing".to_string(),
            raw_arguments: "{\"q\":".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("#1"));
        assert!(display.contains("search"));
        assert!(display.contains("call_9"));
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let config_err: ConfigError = result.unwrap_err().into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }
}
