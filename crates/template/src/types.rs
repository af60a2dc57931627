//! Code-block domain types.
//!
//! A code block is a fenced snippet extracted from a prompt template,
//! tagged with an execution phase and a runtime. Blocks are immutable
//! after extraction and consumed read-only by the execution engine.

use serde::{Deserialize, Serialize};

/// Execution phase of a code block.
///
/// `Pre` blocks run before the main render/LLM step, `Post` blocks after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pre,
    Post,
}

/// Runtime a code block executes under.
///
/// Derived from the fence tag by substring match: `js`, then `bash`, then
/// `python` — first match wins. A tag matching none of them yields an
/// inert block the engine skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockRuntime {
    Js,
    Bash,
    Python,
}

impl BlockRuntime {
    /// Detect the runtime from a fence tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag.contains("js") {
            Some(Self::Js)
        } else if tag.contains("bash") {
            Some(Self::Bash)
        } else if tag.contains("python") {
            Some(Self::Python)
        } else {
            None
        }
    }
}

/// A fenced snippet extracted from a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    /// The raw fence tag (e.g. "js:pre", "bash")
    pub tag: String,

    /// Execution phase derived from the tag
    pub phase: Phase,

    /// Runtime derived from the tag; `None` = inert block
    pub runtime: Option<BlockRuntime>,

    /// The fence body
    pub source: String,
}

impl CodeBlock {
    /// Build a block from a fence tag and body, deriving phase and runtime.
    ///
    /// A tag ending in `:pre` is a pre-phase block; an unqualified tag
    /// (no `:`) is post. A tag carrying any other qualifier is inert in
    /// both phases: only `:pre` is a recognized phase marker.
    pub fn from_fence(tag: impl Into<String>, source: impl Into<String>) -> Self {
        let tag = tag.into();
        let phase = if tag.ends_with(":pre") {
            Phase::Pre
        } else {
            Phase::Post
        };
        let runtime = if phase == Phase::Post && tag.contains(':') {
            None
        } else {
            BlockRuntime::from_tag(&tag)
        };

        Self {
            tag,
            phase,
            runtime,
            source: source.into(),
        }
    }
}
