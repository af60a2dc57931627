//! Prompt templates for codeprompt.
//!
//! This crate provides:
//! - Fenced code-block extraction and classification
//! - Schema synthesis from JSON examples
//! - Handlebars template compilation and rendering

pub mod extract;
pub mod render;
pub mod schema;
pub mod types;

// Re-export main types
pub use extract::{extract_fences, extract_template, Extraction, Fence};
pub use render::{Template, DEFAULT_TEMPLATE};
pub use schema::SchemaNode;
pub use types::{BlockRuntime, CodeBlock, Phase};
