//! Scripted runtimes (node, python).
//!
//! A scripted block is evaluated by a small harness running in a child
//! interpreter. Host and harness speak a line-delimited JSON protocol:
//! the host sends `{context, source}` as the first stdin line; the
//! harness builds a function whose only visible bindings are the context
//! entries plus `log`/`prompt` helper shims and the three callable
//! bridges (`query_llm`, `request`, `extract_code_blocks`), wraps the
//! block source in an asynchronous body, and awaits it. A bridge call is
//! a `{bridge, id, args}` stdout line the host answers with a `{value}`
//! or `{error}` stdin line; the final `{result}` line carries the block's
//! return value. Diagnostics go to stderr.
//!
//! An object-shaped return value becomes context bindings; any other
//! return shape is handed back to the caller unmerged.

use crate::context::ExecutionContext;
use codeprompt_core::{AppError, AppResult};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Host-side handler for the callable bridges a block may invoke.
///
/// The harness always exposes the bridge functions; without a handler the
/// host answers every call with an error, which surfaces in the block as
/// a thrown exception.
#[async_trait::async_trait]
pub trait ScriptBridge: Send + Sync {
    /// Service one bridge call from a running block.
    async fn call(&self, name: &str, args: Vec<Value>) -> AppResult<Value>;
}

/// Node harness: allow-listed bindings via constructed async-function
/// parameters, no ambient access to the context beyond what is passed in.
const NODE_HARNESS: &str = r##"
const readline = require("readline");
const rl = readline.createInterface({ input: process.stdin, terminal: false });
const pending = [];
const waiters = [];
rl.on("line", (line) => {
  const waiter = waiters.shift();
  if (waiter) waiter(line); else pending.push(line);
});
const nextLine = () =>
  new Promise((resolve) => {
    const line = pending.shift();
    if (line !== undefined) resolve(line); else waiters.push(resolve);
  });
const colors = { "*": "33", "#": "36", "@": "32" };
const colorize = (text) =>
  String(text).replace(/(^|\s)([*#@])(\S+)/g, (_, lead, t, token) =>
    lead + "\x1b[" + colors[t] + "m" + token + "\x1b[0m");
const log = (message, data) => {
  process.stderr.write(colorize(message) +
    (data === undefined ? "" : " " + JSON.stringify(data)) + "\n");
};
const readTtyLine = () => {
  const fs = require("fs");
  const fd = fs.openSync("/dev/tty", "rs");
  const buf = Buffer.alloc(1);
  let line = "";
  for (;;) {
    const n = fs.readSync(fd, buf, 0, 1, null);
    if (n === 0 || buf[0] === 10) break;
    line += String.fromCharCode(buf[0]);
  }
  fs.closeSync(fd);
  return line;
};
const prompt = async (question, validate) => {
  for (;;) {
    process.stderr.write(colorize(question) + " ");
    const answer = readTtyLine();
    if (!validate || validate(answer) === true) return answer;
  }
};
let seq = 0;
const bridge = (name) => async (...args) => {
  const id = ++seq;
  process.stdout.write(JSON.stringify({ bridge: name, id, args }) + "\n");
  const reply = JSON.parse(await nextLine());
  if (reply.error !== undefined) throw new Error(reply.error);
  return reply.value;
};
(async () => {
  const payload = JSON.parse(await nextLine());
  const context = payload.context || {};
  const queryLLM = bridge("query_llm");
  const request = bridge("request");
  const extractCodeBlocks = bridge("extract_code_blocks");
  const AsyncFunction = Object.getPrototypeOf(async function () {}).constructor;
  const names = Object.keys(context);
  const fn = new AsyncFunction(
    ...names, "log", "prompt", "queryLLM", "request", "extractCodeBlocks",
    payload.source);
  const result = await fn(
    ...names.map((n) => context[n]), log, prompt, queryLLM, request,
    extractCodeBlocks);
  process.stdout.write(
    JSON.stringify({ result: result === undefined ? null : result }) + "\n",
    () => process.exit(0));
})().catch((err) => {
  process.stderr.write(String(err && err.stack ? err.stack : err),
    () => process.exit(1));
});
"##;

/// Python harness: same protocol, namespace allow-listing via exec.
const PYTHON_HARNESS: &str = r##"
import asyncio
import json
import re
import sys

_COLORS = {"*": "33", "#": "36", "@": "32"}

def _colorize(text):
    def repl(m):
        return m.group(1) + "\x1b[" + _COLORS[m.group(2)] + "m" + m.group(3) + "\x1b[0m"
    return re.sub(r"(^|\s)([*#@])(\S+)", repl, str(text))

def log(message, data=None):
    line = _colorize(message)
    if data is not None:
        line += " " + json.dumps(data)
    sys.stderr.write(line + "\n")

def prompt(question, validate=None):
    with open("/dev/tty", "r") as tty:
        while True:
            sys.stderr.write(_colorize(question) + " ")
            sys.stderr.flush()
            answer = tty.readline().rstrip("\n")
            if validate is None or validate(answer) is True:
                return answer

_seq = 0

def _bridge(name):
    def call(*args):
        global _seq
        _seq += 1
        sys.stdout.write(json.dumps({"bridge": name, "id": _seq, "args": list(args)}) + "\n")
        sys.stdout.flush()
        reply = json.loads(sys.stdin.readline())
        if "error" in reply:
            raise RuntimeError(reply["error"])
        return reply.get("value")
    return call

payload = json.loads(sys.stdin.readline())
context = payload.get("context") or {}
source = payload.get("source") or ""

namespace = dict(context)
namespace["log"] = log
namespace["prompt"] = prompt
namespace["query_llm"] = _bridge("query_llm")
namespace["request"] = _bridge("request")
namespace["extract_code_blocks"] = _bridge("extract_code_blocks")

indented = "\n".join("    " + line for line in source.splitlines())
wrapper = "async def __block__():\n" + (indented or "    pass") + "\n"

try:
    exec(wrapper, namespace)
    result = asyncio.run(namespace["__block__"]())
    sys.stdout.write(json.dumps({"result": result}) + "\n")
except Exception as exc:
    sys.stderr.write(str(exc))
    sys.exit(1)
"##;

/// Scripted interpreter flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpreter {
    Node,
    Python,
}

impl Interpreter {
    fn program(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Python => "python3",
        }
    }

    fn harness(&self) -> &'static str {
        match self {
            Self::Node => NODE_HARNESS,
            Self::Python => PYTHON_HARNESS,
        }
    }

    fn eval_flag(&self) -> &'static str {
        match self {
            Self::Node => "-e",
            Self::Python => "-c",
        }
    }
}

/// Result of one scripted block.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    /// The block's return value (Null when it returned nothing)
    pub value: Value,

    /// Bindings to merge: populated only for object-shaped return values
    pub bindings: BTreeMap<String, Value>,
}

async fn write_line(
    stdin: &mut tokio::process::ChildStdin,
    value: &Value,
) -> AppResult<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| AppError::execution(format!("Failed to write to interpreter: {}", e)))?;
    stdin
        .flush()
        .await
        .map_err(|e| AppError::execution(format!("Failed to flush interpreter stdin: {}", e)))
}

/// Execute a scripted block against an immutable context snapshot.
///
/// Bridge calls made by the block are serviced by `bridge`; with no
/// handler each call is answered with an error the block sees as a
/// thrown exception.
pub async fn run_script(
    interpreter: Interpreter,
    source: &str,
    context: &ExecutionContext,
    workdir: Option<&PathBuf>,
    bridge: Option<&dyn ScriptBridge>,
) -> AppResult<ScriptOutcome> {
    let payload = json!({
        "context": context.to_json(),
        "source": source,
    });

    tracing::debug!(
        "Running {:?} block ({} context binding(s))",
        interpreter,
        context.len()
    );

    let mut command = Command::new(interpreter.program());
    command
        .arg(interpreter.eval_flag())
        .arg(interpreter.harness())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(workdir) = workdir {
        command.current_dir(workdir);
    }

    let mut child = command.spawn().map_err(|e| {
        AppError::execution(format!(
            "Failed to spawn {}: {}",
            interpreter.program(),
            e
        ))
    })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::execution("Interpreter stdin was not captured"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::execution("Interpreter stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::execution("Interpreter stderr was not captured"))?;

    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut collected = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    });

    write_line(&mut stdin, &payload).await?;

    // Protocol loop: answer bridge calls until the result document arrives
    let mut out_lines = BufReader::new(stdout).lines();
    let mut result = None;
    let mut stray = String::new();
    while let Some(line) = out_lines
        .next_line()
        .await
        .map_err(|e| AppError::execution(format!("Failed to read interpreter output: {}", e)))?
    {
        match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(mut map)) if map.contains_key("bridge") => {
                let name = map
                    .get("bridge")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let args = match map.remove("args") {
                    Some(Value::Array(args)) => args,
                    _ => Vec::new(),
                };
                let reply = match bridge {
                    Some(bridge) => match bridge.call(&name, args).await {
                        Ok(value) => json!({ "value": value }),
                        Err(err) => json!({ "error": err.to_string() }),
                    },
                    None => json!({
                        "error": format!("No host handler for bridge call '{}'", name)
                    }),
                };
                write_line(&mut stdin, &reply).await?;
            }
            Ok(Value::Object(mut map)) if map.contains_key("result") => {
                result = map.remove("result");
                break;
            }
            _ => {
                stray.push_str(&line);
                stray.push('\n');
            }
        }
    }
    drop(stdin);

    let status = child
        .wait()
        .await
        .map_err(|e| AppError::execution(format!("Failed to wait for interpreter: {}", e)))?;
    let stderr_text = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(AppError::execution_with_output(
            format!(
                "{} block exited with {:?}",
                interpreter.program(),
                status.code()
            ),
            format!("{}{}", stray, stderr_text),
        ));
    }

    let value = result.unwrap_or(Value::Null);
    let bindings = match &value {
        Value::Object(map) => map.clone().into_iter().collect(),
        _ => BTreeMap::new(),
    };

    Ok(ScriptOutcome { value, bindings })
}
