//! Schema-constrained completion.
//!
//! When a schema is enforced, the prompt is suffixed with an instruction
//! block rendered from the schema shape, and the response payload is
//! located in the model text, parsed, and structurally validated. The
//! normalized result is always `{data, usage}`: `data` is the
//! schema-shaped payload when a schema was supplied, else the raw text.

use crate::client::{ChatRequest, ChatResponse, LlmClient, Usage};
use codeprompt_core::{AppError, AppResult};
use codeprompt_template::{extract_fences, SchemaNode};
use serde_json::Value;

/// Normalized provider response.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Schema-shaped payload, or the raw text as a JSON string
    pub data: Value,

    /// Token usage reported by the provider
    pub usage: Usage,
}

/// Render the instruction block appended to prompts when a schema is
/// enforced.
pub fn schema_instruction(schema: &SchemaNode) -> String {
    let shape = serde_json::to_string_pretty(&schema.shape_json()).unwrap_or_default();
    format!(
        "\n\nRespond with a single JSON object matching this shape, where each \
         string describes the expected field content:\n```json\n{}\n```\n\
         Return only the JSON object.",
        shape
    )
}

/// Locate the first JSON value in model output: the whole text, a fenced
/// block, or the outermost brace span.
pub fn locate_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    for fence in extract_fences(text) {
        if let Ok(value) = serde_json::from_str::<Value>(fence.body.trim()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
            return Some(value);
        }
    }
    None
}

/// Issue a completion, optionally enforcing a response schema.
pub async fn complete(
    client: &dyn LlmClient,
    model: &str,
    prompt: &str,
    schema: Option<&SchemaNode>,
) -> AppResult<Completion> {
    let full_prompt = match schema {
        Some(schema) => format!("{}{}", prompt, schema_instruction(schema)),
        None => prompt.to_string(),
    };

    let request = ChatRequest::new(full_prompt, model);
    let response = client.complete(&request).await?;

    normalize(response, schema)
}

/// Normalize a raw response into `{data, usage}`.
fn normalize(response: ChatResponse, schema: Option<&SchemaNode>) -> AppResult<Completion> {
    let data = match schema {
        Some(schema) => {
            let payload = locate_json(&response.content).ok_or_else(|| {
                AppError::Serialization(format!(
                    "Model response contains no JSON payload: {}",
                    truncate(&response.content, 200)
                ))
            })?;
            if !schema.validate(&payload) {
                return Err(AppError::Serialization(format!(
                    "Model payload does not match the enforced schema: {}",
                    truncate(&payload.to_string(), 200)
                )));
            }
            payload
        }
        None => Value::String(response.content),
    };

    Ok(Completion {
        data,
        usage: response.usage,
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
