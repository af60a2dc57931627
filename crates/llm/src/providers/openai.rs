//! OpenAI-compatible chat transport.
//!
//! Serves both OpenAI and Groq, which expose the same
//! `/chat/completions` wire format behind different base URLs.

use crate::client::{ChatRequest, ChatResponse, LlmClient, Usage};
use codeprompt_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Fixed transport timeout; retries belong to callers, not the core.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    model: String,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: WireUsage,
}

/// Chat client for OpenAI-compatible APIs.
pub struct OpenAiCompatClient {
    name: &'static str,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Client against the OpenAI API.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::with_base_url("openai", OPENAI_BASE_URL, api_key)
    }

    /// Client against the Groq API.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::with_base_url("groq", GROQ_BASE_URL, api_key)
    }

    /// Client against an arbitrary compatible endpoint.
    pub fn with_base_url(
        name: &'static str,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name,
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    fn to_wire(&self, request: &ChatRequest) -> WireRequest {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(WireMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        WireRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    fn provider_name(&self) -> &str {
        self.name
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        tracing::info!("Sending completion request to {}", self.name);
        tracing::debug!("Model: {}", request.model);

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.to_wire(request))
            .send()
            .await
            .map_err(|e| AppError::Network(format!("{} request failed: {}", self.name, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Network(format!(
                "{} API error ({}): {}",
                self.name, status, error_text
            )));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| AppError::Network(format!("Failed to parse {} response: {}", self.name, e)))?;

        let content = wire
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            model: wire.model,
            usage: Usage::new(wire.usage.prompt_tokens, wire.usage.completion_tokens),
        })
    }
}
