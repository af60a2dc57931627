//! LLM provider clients, ranked selection, and schema-constrained
//! completion.
//!
//! Providers are never required: when no credential or token budget
//! allows a selection, [`select_provider`] yields `None` and callers
//! degrade gracefully.

pub mod client;
pub mod completion;
pub mod factory;
pub mod providers;
pub mod select;

pub use client::{ChatRequest, ChatResponse, LlmClient, Usage};
pub use completion::{complete, locate_json, schema_instruction, Completion};
pub use factory::create_client;
pub use select::{estimate_tokens, select_provider, Credentials, Provider, ProviderChoice};
