//! Template compilation and rendering.
//!
//! A [`Template`] is loaded once from a file (or the built-in default),
//! its tagged fences are extracted and classified, and the remaining text
//! is compiled for handlebars rendering. Reloading discards the prior
//! block list and schema.

use crate::extract::{extract_template, Extraction};
use crate::schema::SchemaNode;
use crate::types::CodeBlock;
use codeprompt_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::path::Path;

/// Built-in fallback template used when no template path is configured.
///
/// Placeholder names are stable contract: `absolute_code_path`,
/// `source_tree`, `files[].path`, `files[].code`.
pub const DEFAULT_TEMPLATE: &str = r#"Project Path: {{absolute_code_path}}

Source Tree:

```
{{source_tree}}
```

{{#each files}}
{{#if code}}
`{{path}}`:

{{{code}}}

{{/if}}
{{/each}}
"#;

const TEMPLATE_NAME: &str = "prompt";

/// A compiled prompt template.
///
/// Immutable once compiled: raw text, ordered code blocks, and the
/// optional synthesized schema are fixed at load time.
pub struct Template {
    stripped: String,
    blocks: Vec<CodeBlock>,
    schema: Option<SchemaNode>,
    registry: Handlebars<'static>,
}

impl Template {
    /// Load a template from a file, falling back to the built-in default
    /// when no path is given.
    ///
    /// `external_schema` is a schema configured by the caller; when
    /// present, schema fences in the template are still parsed (and
    /// removed) but do not replace it.
    pub fn load(path: Option<&Path>, external_schema: Option<SchemaNode>) -> AppResult<Self> {
        let text = match path {
            Some(path) => {
                tracing::debug!("Loading template from {:?}", path);
                std::fs::read_to_string(path).map_err(|e| {
                    AppError::Load(format!("Failed to read template {:?}: {}", path, e))
                })?
            }
            None => {
                tracing::debug!("No template path configured, using built-in default");
                DEFAULT_TEMPLATE.to_string()
            }
        };
        Self::compile(&text, external_schema)
    }

    /// Compile a template from raw text.
    pub fn compile(text: &str, external_schema: Option<SchemaNode>) -> AppResult<Self> {
        let Extraction {
            stripped,
            blocks,
            schema,
        } = extract_template(text)?;

        // An externally configured schema always wins over a template one
        let schema = external_schema.or(schema);

        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(TEMPLATE_NAME, &stripped)
            .map_err(|e| AppError::Load(format!("Failed to compile template: {}", e)))?;

        tracing::info!(
            "Template compiled: {} code block(s), schema {}",
            blocks.len(),
            if schema.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            stripped,
            blocks,
            schema,
            registry,
        })
    }

    /// Render the template against a variable mapping.
    pub fn render(&self, variables: &serde_json::Value) -> AppResult<String> {
        self.registry
            .render(TEMPLATE_NAME, variables)
            .map_err(|e| AppError::Load(format!("Failed to render template: {}", e)))
    }

    /// The template text after tagged-fence removal.
    pub fn text(&self) -> &str {
        &self.stripped
    }

    /// Extracted code blocks, in source order.
    pub fn blocks(&self) -> &[CodeBlock] {
        &self.blocks
    }

    /// The response schema, if one was synthesized or supplied.
    pub fn schema(&self) -> Option<&SchemaNode> {
        self.schema.as_ref()
    }
}
