//! Context assembly.
//!
//! Combines caller-supplied variables with the computed defaults derived
//! from a directory scan. Caller entries always win: the defaults are
//! merged with `merge_defaults`, which never overwrites an existing key.

use codeprompt_core::AppResult;
use codeprompt_exec::ExecutionContext;
use codeprompt_scan::ScanOutput;
use serde_json::Value;

/// Build the execution context for one run.
///
/// The computed defaults are `absolute_code_path`, `source_tree` and
/// `files`; any of them already present in `variables` is left untouched.
pub fn assemble_context(scan: &ScanOutput, variables: Value) -> AppResult<ExecutionContext> {
    let mut context = ExecutionContext::from_value(variables);

    let defaults = [
        (
            "absolute_code_path".to_string(),
            Value::String(scan.absolute_root.display().to_string()),
        ),
        (
            "source_tree".to_string(),
            Value::String(scan.tree_text.clone()),
        ),
        ("files".to_string(), serde_json::to_value(&scan.files)?),
    ];
    context.merge_defaults(defaults);

    tracing::debug!(
        "Context assembled: {} variable(s), {} file(s)",
        context.len(),
        scan.files.len()
    );
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeprompt_scan::FileEntry;
    use serde_json::json;
    use std::path::PathBuf;

    fn scan_fixture() -> ScanOutput {
        ScanOutput {
            absolute_root: PathBuf::from("/work/project"),
            tree_text: "project\n└── main.rs".to_string(),
            files: vec![FileEntry {
                path: "main.rs".to_string(),
                code: "fn main() {}".to_string(),
            }],
        }
    }

    #[test]
    fn test_defaults_are_computed() {
        let context = assemble_context(&scan_fixture(), json!({})).unwrap();
        assert_eq!(
            context.get("absolute_code_path"),
            Some(&json!("/work/project"))
        );
        assert_eq!(
            context.get("source_tree"),
            Some(&json!("project\n└── main.rs"))
        );
        assert_eq!(
            context.get("files"),
            Some(&json!([{"path": "main.rs", "code": "fn main() {}"}]))
        );
    }

    #[test]
    fn test_caller_variables_win_over_defaults() {
        let vars = json!({"source_tree": "elsewhere", "audience": "reviewers"});
        let context = assemble_context(&scan_fixture(), vars).unwrap();
        assert_eq!(context.get("source_tree"), Some(&json!("elsewhere")));
        assert_eq!(context.get("audience"), Some(&json!("reviewers")));
        // Untouched defaults still computed
        assert_eq!(
            context.get("absolute_code_path"),
            Some(&json!("/work/project"))
        );
    }
}
