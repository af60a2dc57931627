//! Command handlers for the codeprompt CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod blocks;
pub mod prompt;
pub mod run;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use blocks::BlocksCommand;
pub use prompt::PromptCommand;
pub use run::RunCommand;

use codeprompt_core::{AppError, AppResult};
use serde_json::Value;

/// Parse a `--vars` JSON object argument.
pub(crate) fn parse_vars(raw: Option<&str>) -> AppResult<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| AppError::Config(format!("--vars is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(AppError::Config(
            "--vars must be a JSON object".to_string(),
        ));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_vars_object() {
        let vars = parse_vars(Some(r#"{"audience": "reviewers"}"#)).unwrap();
        assert_eq!(vars, Some(json!({"audience": "reviewers"})));
    }

    #[test]
    fn test_parse_vars_rejects_non_objects() {
        assert!(parse_vars(Some("[1, 2]")).is_err());
        assert!(parse_vars(Some("not json")).is_err());
    }

    #[test]
    fn test_parse_vars_absent() {
        assert_eq!(parse_vars(None).unwrap(), None);
    }
}
