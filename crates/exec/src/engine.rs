//! Two-phase code-block execution.
//!
//! Blocks run strictly in source order within a phase, and each block's
//! bindings are merged into the context before the next block starts:
//! later blocks must observe earlier blocks' outputs, so no concurrent
//! block execution is permitted.

use crate::context::ExecutionContext;
use crate::scripted::{run_script, Interpreter, ScriptBridge};
use crate::shell::{run_shell, ShellOptions};
use codeprompt_core::{AppError, AppResult};
use codeprompt_template::{BlockRuntime, CodeBlock, Phase};
use std::path::PathBuf;
use std::sync::Arc;

/// Executes classified code blocks against a growing context.
#[derive(Clone, Default)]
pub struct ExecutionEngine {
    /// Working directory for scripted and shell children
    pub workdir: Option<PathBuf>,

    /// Shell runtime configuration
    pub shell: ShellOptions,

    /// Handler for bridge calls made by scripted blocks
    bridge: Option<Arc<dyn ScriptBridge>>,
}

impl ExecutionEngine {
    pub fn new(workdir: Option<PathBuf>, shell: ShellOptions) -> Self {
        let shell = ShellOptions {
            workdir: shell.workdir.or_else(|| workdir.clone()),
            ..shell
        };
        Self {
            workdir,
            shell,
            bridge: None,
        }
    }

    /// Attach a bridge-call handler for scripted blocks.
    pub fn with_bridge(mut self, bridge: Arc<dyn ScriptBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Run every block of `phase`, in source order, merging each block's
    /// bindings into `context` before the next block starts.
    ///
    /// A failing block aborts the remaining blocks of the phase; bindings
    /// merged by earlier blocks are retained in `context`.
    pub async fn run_phase(
        &self,
        phase: Phase,
        blocks: &[CodeBlock],
        context: &mut ExecutionContext,
    ) -> AppResult<()> {
        for block in blocks.iter().filter(|b| b.phase == phase) {
            let Some(runtime) = block.runtime else {
                tracing::debug!("Skipping inert `{}` block", block.tag);
                continue;
            };

            tracing::debug!("Executing `{}` block ({:?})", block.tag, phase);
            let bindings = self.run_block(runtime, &block.source, context).await?;
            context.merge(bindings);
        }
        Ok(())
    }

    async fn run_block(
        &self,
        runtime: BlockRuntime,
        source: &str,
        context: &ExecutionContext,
    ) -> AppResult<Vec<(String, serde_json::Value)>> {
        match runtime {
            BlockRuntime::Js => {
                let outcome = run_script(
                    Interpreter::Node,
                    source,
                    context,
                    self.workdir.as_ref(),
                    self.bridge.as_deref(),
                )
                .await?;
                Ok(outcome.bindings.into_iter().collect())
            }
            BlockRuntime::Python => {
                let outcome = run_script(
                    Interpreter::Python,
                    source,
                    context,
                    self.workdir.as_ref(),
                    self.bridge.as_deref(),
                )
                .await?;
                Ok(outcome.bindings.into_iter().collect())
            }
            BlockRuntime::Bash => {
                let outcome = run_shell(source, context, &self.shell).await?;
                Ok(outcome.bindings.into_iter().collect())
            }
        }
    }

    /// Run a single ad-hoc scripted or shell source, outside any template.
    pub async fn run_source(
        &self,
        runtime: BlockRuntime,
        source: &str,
        context: &mut ExecutionContext,
    ) -> AppResult<()> {
        let bindings = self.run_block(runtime, source, context).await?;
        context.merge(bindings);
        Ok(())
    }
}

/// Convenience: map an execution error for diagnostics without losing the
/// retained context (the caller keeps the `&mut ExecutionContext`).
pub fn describe_failure(err: &AppError) -> String {
    match err {
        AppError::Execution {
            message,
            output: Some(output),
        } => format!("{} — output:\n{}", message, output),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blocks(specs: &[(&str, &str)]) -> Vec<CodeBlock> {
        specs
            .iter()
            .map(|(tag, source)| CodeBlock::from_fence(*tag, *source))
            .collect()
    }

    #[tokio::test]
    async fn test_phase_filtering() {
        let engine = ExecutionEngine::default();
        let mut ctx = ExecutionContext::new();
        let blocks = blocks(&[
            ("bash:pre", "echo '{\"pre_ran\": true}'"),
            ("bash", "echo '{\"post_ran\": true}'"),
        ]);

        engine
            .run_phase(Phase::Pre, &blocks, &mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.get("pre_ran"), Some(&json!(true)));
        assert_eq!(ctx.get("post_ran"), None);

        engine
            .run_phase(Phase::Post, &blocks, &mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.get("post_ran"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_later_blocks_observe_earlier_bindings() {
        let engine = ExecutionEngine::default();
        let mut ctx = ExecutionContext::new();
        // B1 binds x=1; B2 reads x through substitution and binds y=x+1
        let blocks = blocks(&[
            ("bash:pre", "echo '{\"x\": 1}'"),
            ("bash:pre", "echo \"{\\\"y\\\": $(( {x} + 1 ))}\""),
        ]);

        engine
            .run_phase(Phase::Pre, &blocks, &mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.get("x"), Some(&json!(1)));
        assert_eq!(ctx.get("y"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_swapped_order_fails_to_resolve() {
        // Ordering is load-bearing: reading x before it is bound leaves the
        // placeholder literal, which breaks the arithmetic expansion.
        let engine = ExecutionEngine::default();
        let mut ctx = ExecutionContext::new();
        let blocks = blocks(&[
            ("bash:pre", "echo \"{\\\"y\\\": $(( {x} + 1 ))}\""),
            ("bash:pre", "echo '{\"x\": 1}'"),
        ]);

        let result = engine.run_phase(Phase::Pre, &blocks, &mut ctx).await;
        assert!(result.is_err());
        assert_eq!(ctx.get("y"), None);
    }

    #[tokio::test]
    async fn test_failure_aborts_phase_and_retains_bindings() {
        let engine = ExecutionEngine::default();
        let mut ctx = ExecutionContext::new();
        let blocks = blocks(&[
            ("bash:pre", "echo '{\"first\": 1}'"),
            ("bash:pre", "exit 7"),
            ("bash:pre", "echo '{\"never\": true}'"),
        ]);

        let result = engine.run_phase(Phase::Pre, &blocks, &mut ctx).await;
        assert!(matches!(result, Err(AppError::Execution { .. })));
        // The first block's bindings survive; the third never ran
        assert_eq!(ctx.get("first"), Some(&json!(1)));
        assert_eq!(ctx.get("never"), None);
    }

    #[tokio::test]
    async fn test_qualified_non_pre_tags_never_execute() {
        // `bash:post` carries a qualifier other than `:pre`, so it is
        // inert in both phases rather than a post-phase block.
        let engine = ExecutionEngine::default();
        let mut ctx = ExecutionContext::new();
        let blocks = blocks(&[("bash:post", "echo '{\"ran\": true}'")]);

        engine
            .run_phase(Phase::Pre, &blocks, &mut ctx)
            .await
            .unwrap();
        engine
            .run_phase(Phase::Post, &blocks, &mut ctx)
            .await
            .unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_inert_blocks_skipped() {
        let engine = ExecutionEngine::default();
        let mut ctx = ExecutionContext::new();
        let blocks = blocks(&[("mermaid", "graph TD; A-->B;")]);

        engine
            .run_phase(Phase::Post, &blocks, &mut ctx)
            .await
            .unwrap();
        assert!(ctx.is_empty());
    }
}
