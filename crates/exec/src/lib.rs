//! Sandboxed code-block execution for codeprompt.
//!
//! Blocks extracted from a template run against a growing execution
//! context in two strictly-ordered phases. Scripted blocks (node, python)
//! evaluate inside a restricted child-interpreter harness whose only
//! visible bindings are the ones explicitly supplied; shell blocks run
//! under `bash -c` with `{identifier}` placeholder substitution.

pub mod context;
pub mod engine;
pub mod scripted;
pub mod shell;

// Re-export main types
pub use context::ExecutionContext;
pub use engine::ExecutionEngine;
pub use scripted::{run_script, Interpreter, ScriptBridge, ScriptOutcome};
pub use shell::{run_shell, run_shell_streaming, CaptureMode, ShellOptions, ShellOutcome};
