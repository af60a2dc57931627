//! Client factory.
//!
//! Turns a [`ProviderChoice`] and the threaded-in credentials into a
//! concrete transport.

use crate::client::LlmClient;
use crate::providers::{AnthropicClient, OpenAiCompatClient};
use crate::select::{Credentials, Provider, ProviderChoice};
use codeprompt_core::{AppError, AppResult};
use std::sync::Arc;

/// Create a transport for a selected provider.
///
/// # Errors
/// Returns a config error if the credential for the chosen provider is
/// absent (the selector normally guarantees it is present).
pub fn create_client(
    choice: &ProviderChoice,
    credentials: &Credentials,
) -> AppResult<Arc<dyn LlmClient>> {
    let api_key = credentials.get(choice.provider).ok_or_else(|| {
        AppError::Config(format!(
            "No credential for selected provider {}",
            choice.provider.as_str()
        ))
    })?;

    let client: Arc<dyn LlmClient> = match choice.provider {
        Provider::OpenAi => Arc::new(OpenAiCompatClient::openai(api_key)),
        Provider::Groq => Arc::new(OpenAiCompatClient::groq(api_key)),
        Provider::Anthropic => Arc::new(AnthropicClient::new(api_key)),
    };

    Ok(client)
}
