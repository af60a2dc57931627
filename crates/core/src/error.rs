//! Error types for codeprompt.
//!
//! This module defines a unified error enum covering every failure category
//! in the system: template loading, code-block execution, provider
//! transport, configuration, and I/O.
//!
//! Provider unavailability (no credential or no token-capacity match) is
//! deliberately NOT an error: callers receive an empty result and a
//! diagnostic instead.

use thiserror::Error;

/// Unified error type for codeprompt.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Errors are represented and propagated, never panicked on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Template loading errors: unreadable template file, malformed schema
    /// JSON inside a `schema` fence. Fatal for the load in progress.
    #[error("Load error: {0}")]
    Load(String),

    /// Code-block execution errors: scripted-sandbox failure, nonzero shell
    /// exit, spawn failure. Aborts the remaining blocks of the current
    /// phase. `output` carries whatever the block wrote before failing.
    #[error("Execution error: {message}")]
    Execution {
        message: String,
        /// Captured stdout/stderr of the failing block, if any.
        output: Option<String>,
    },

    /// Provider transport errors (HTTP failure, bad status, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors, including model payloads that
    /// do not conform to an enforced schema.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build an execution error without captured output.
    pub fn execution(message: impl Into<String>) -> Self {
        AppError::Execution {
            message: message.into(),
            output: None,
        }
    }

    /// Build an execution error carrying the block's captured output.
    pub fn execution_with_output(message: impl Into<String>, output: impl Into<String>) -> Self {
        AppError::Execution {
            message: message.into(),
            output: Some(output.into()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_carries_output() {
        let err = AppError::execution_with_output("exit code 2", "permission denied");
        match err {
            AppError::Execution { message, output } => {
                assert_eq!(message, "exit code 2");
                assert_eq!(output.as_deref(), Some("permission denied"));
            }
            _ => panic!("expected Execution variant"),
        }
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
