//! Shell runtime.
//!
//! Runs a code block under `bash -c` after substituting `{identifier}`
//! placeholders from primitive-typed context entries. The child inherits
//! the host environment overlaid with those entries plus forced
//! non-interactive flags, and runs in the configured working directory.
//! Exit 0 resolves with the captured output; anything else is an
//! execution error carrying that output.

use crate::context::ExecutionContext;
use codeprompt_core::{AppError, AppResult};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// How child output is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// stdout and stderr concatenated into one buffer
    #[default]
    Combined,
    /// stdout and stderr kept apart
    Separate,
}

/// Shell runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// Working directory for the child (None = inherit)
    pub workdir: Option<PathBuf>,

    /// Error on unresolved `{identifier}` placeholders instead of leaving
    /// them literal
    pub strict_vars: bool,

    /// Output capture mode
    pub capture: CaptureMode,

    /// Optional kill-after timeout; None preserves the no-timeout contract
    pub timeout: Option<Duration>,
}

/// Resolved output of a shell block.
#[derive(Debug, Clone)]
pub struct ShellOutcome {
    /// Captured stdout (combined mode appends stderr)
    pub output: String,

    /// Captured stderr in separate mode
    pub stderr: Option<String>,

    /// Bindings produced by the block: the entries of its last output
    /// line when that line is a JSON object
    pub bindings: BTreeMap<String, Value>,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"))
}

/// Substitute `{identifier}` placeholders from primitive context entries.
///
/// Unresolved identifiers are left as literal text unless `strict` is set,
/// in which case they are an execution error.
pub fn substitute(source: &str, context: &ExecutionContext, strict: bool) -> AppResult<String> {
    let primitives = context.primitives();
    let mut missing = Vec::new();

    let substituted = placeholder_regex().replace_all(source, |caps: &regex::Captures| {
        let name = &caps[1];
        match primitives.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.push(name.to_string());
                caps[0].to_string()
            }
        }
    });

    if strict && !missing.is_empty() {
        return Err(AppError::execution(format!(
            "Unresolved shell placeholders: {}",
            missing.join(", ")
        )));
    }

    Ok(substituted.into_owned())
}

/// Forced non-interactive environment for shell children.
fn non_interactive_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("DEBIAN_FRONTEND", "noninteractive"),
        ("GIT_TERMINAL_PROMPT", "0"),
        ("CI", "true"),
    ]
}

fn build_command(script: &str, context: &ExecutionContext, options: &ShellOptions) -> Command {
    let mut command = Command::new("bash");
    command.arg("-c").arg(script);

    if let Some(ref workdir) = options.workdir {
        command.current_dir(workdir);
    }

    // Host environment overlaid with primitive context entries
    for (key, value) in context.primitives() {
        command.env(key, value);
    }
    for (key, value) in non_interactive_env() {
        command.env(key, value);
    }

    command.stdin(Stdio::null());
    command.kill_on_drop(true);
    command
}

/// Extract bindings from the last non-empty output line when it parses as
/// a JSON object.
fn parse_bindings(output: &str) -> BTreeMap<String, Value> {
    let Some(last_line) = output.lines().rev().find(|l| !l.trim().is_empty()) else {
        return BTreeMap::new();
    };
    match serde_json::from_str::<Value>(last_line.trim()) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    }
}

/// Execute a shell block against the context.
pub async fn run_shell(
    source: &str,
    context: &ExecutionContext,
    options: &ShellOptions,
) -> AppResult<ShellOutcome> {
    let script = substitute(source, context, options.strict_vars)?;
    tracing::debug!("Running shell block: {}", script);

    let mut command = build_command(&script, context, options);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let child = command
        .spawn()
        .map_err(|e| AppError::execution(format!("Failed to spawn shell: {}", e)))?;

    let output = match options.timeout {
        Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AppError::execution(format!("Shell block timed out after {:?}", timeout))
            })?,
        None => child.wait_with_output().await,
    }
    .map_err(|e| AppError::execution(format!("Failed to wait for shell: {}", e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let code = output.status.code();
        return Err(AppError::execution_with_output(
            format!("Shell block exited with {:?}", code),
            format!("{}{}", stdout, stderr),
        ));
    }

    let (captured, separate_stderr) = match options.capture {
        CaptureMode::Combined => (format!("{}{}", stdout, stderr), None),
        CaptureMode::Separate => (stdout, Some(stderr)),
    };

    let bindings = parse_bindings(&captured);

    Ok(ShellOutcome {
        output: captured,
        stderr: separate_stderr,
        bindings,
    })
}

/// Streaming variant: identical contract, but each output line is handed
/// to `on_line` as it appears. Still resolves only at process exit.
pub async fn run_shell_streaming(
    source: &str,
    context: &ExecutionContext,
    options: &ShellOptions,
    mut on_line: impl FnMut(&str),
) -> AppResult<ShellOutcome> {
    let script = substitute(source, context, options.strict_vars)?;
    tracing::debug!("Streaming shell block: {}", script);

    let mut command = build_command(&script, context, options);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| AppError::execution(format!("Failed to spawn shell: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::execution("Shell stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::execution("Shell stderr was not captured"))?;

    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_buf = String::new();

    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut collected = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    });

    let mut captured = String::new();
    while let Some(line) = out_lines
        .next_line()
        .await
        .map_err(|e| AppError::execution(format!("Failed to read shell output: {}", e)))?
    {
        on_line(&line);
        captured.push_str(&line);
        captured.push('\n');
    }

    if let Ok(collected) = stderr_task.await {
        err_buf = collected;
    }

    let status = child
        .wait()
        .await
        .map_err(|e| AppError::execution(format!("Failed to wait for shell: {}", e)))?;

    if !status.success() {
        return Err(AppError::execution_with_output(
            format!("Shell block exited with {:?}", status.code()),
            format!("{}{}", captured, err_buf),
        ));
    }

    let (captured, separate_stderr) = match options.capture {
        CaptureMode::Combined => (format!("{}{}", captured, err_buf), None),
        CaptureMode::Separate => (captured, Some(err_buf)),
    };

    let bindings = parse_bindings(&captured);

    Ok(ShellOutcome {
        output: captured,
        stderr: separate_stderr,
        bindings,
    })
}
