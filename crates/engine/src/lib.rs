//! Orchestration layer for codeprompt.
//!
//! Ties scanning, templating, code-block execution and provider calls
//! together behind a single [`Orchestrator`], with context assembly,
//! helper capabilities, and append-only QA session recording.

pub mod assembler;
pub mod helpers;
pub mod orchestrator;
pub mod session;

// Re-export main types
pub use assembler::assemble_context;
pub use helpers::{colorize_markup, log_markup, prompt_user};
pub use orchestrator::{Answer, ContextPrompt, Orchestrator, RequestOptions};
pub use session::{QaEntry, SessionStore};
