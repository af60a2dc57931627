//! Provider selection.
//!
//! A pure function of the rendered text, a ranked provider-preference
//! list, and per-provider credential presence. The first ranked provider
//! whose credential is present and whose token-capacity bracket covers
//! the measured length wins; a secondary threshold inside the provider
//! picks the model variant. No selection is not an error: callers treat
//! `None` as "no backend available" and degrade to an empty result.

use serde::{Deserialize, Serialize};

/// A model provider backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Groq,
}

impl Provider {
    /// Parse a provider name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }

    /// Canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Groq => "groq",
        }
    }
}

/// Per-provider API credentials.
///
/// Threaded explicitly into selection on every call; never process-wide
/// state.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub groq: Option<String>,
}

impl Credentials {
    /// Read credentials from the environment.
    pub fn from_env() -> Self {
        let read = |primary: &str, fallback: &str| {
            std::env::var(primary)
                .or_else(|_| std::env::var(fallback))
                .ok()
                .filter(|v| !v.is_empty())
        };
        Self {
            openai: read("OPENAI_KEY", "OPENAI_API_KEY"),
            anthropic: read("ANTHROPIC_KEY", "ANTHROPIC_API_KEY"),
            groq: read("GROQ_KEY", "GROQ_API_KEY"),
        }
    }

    /// Get the credential for a provider, if present.
    pub fn get(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAi => self.openai.as_deref(),
            Provider::Anthropic => self.anthropic.as_deref(),
            Provider::Groq => self.groq.as_deref(),
        }
    }

    /// Set the credential for a provider.
    pub fn set(&mut self, provider: Provider, key: impl Into<String>) {
        let slot = match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Anthropic => &mut self.anthropic,
            Provider::Groq => &mut self.groq,
        };
        *slot = Some(key.into());
    }
}

/// The chosen backend configuration for one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderChoice {
    pub provider: Provider,
    pub model_id: String,
    pub max_context_tokens: usize,
}

/// Fixed reference token estimator: one token per four bytes of text.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Pick a backend for the given text.
///
/// Iterates `preferences` in rank order and returns the first provider
/// with a credential and a capacity bracket covering the measured length,
/// with the model variant chosen by a per-provider cutoff.
pub fn select_provider(
    text: &str,
    preferences: &[Provider],
    credentials: &Credentials,
) -> Option<ProviderChoice> {
    let tokens = estimate_tokens(text);

    for &provider in preferences {
        if credentials.get(provider).is_none() {
            continue;
        }

        let choice = match provider {
            Provider::OpenAi if tokens < 128_000 => {
                // Above the cutoff the cheaper variant keeps headroom
                let model_id = if tokens > 64_000 { "gpt-4o-mini" } else { "gpt-4o" };
                Some(ProviderChoice {
                    provider,
                    model_id: model_id.to_string(),
                    max_context_tokens: 128_000,
                })
            }
            Provider::Groq if tokens < 32_000 => {
                let (model_id, cap) = if tokens < 8_100 {
                    ("llama3-70b-8192", 8_100)
                } else {
                    ("mixtral-8x7b-32768", 32_000)
                };
                Some(ProviderChoice {
                    provider,
                    model_id: model_id.to_string(),
                    max_context_tokens: cap,
                })
            }
            Provider::Anthropic if tokens < 200_000 => {
                let model_id = if tokens < 100_000 {
                    "claude-3-5-sonnet-20240620"
                } else {
                    "claude-3-opus-20240229"
                };
                Some(ProviderChoice {
                    provider,
                    model_id: model_id.to_string(),
                    max_context_tokens: 200_000,
                })
            }
            _ => None,
        };

        if let Some(choice) = choice {
            tracing::debug!(
                "Selected {} / {} for ~{} tokens",
                choice.provider.as_str(),
                choice.model_id,
                tokens
            );
            return Some(choice);
        }
    }

    tracing::debug!("No provider qualifies for ~{} tokens", tokens);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(openai: bool, anthropic: bool, groq: bool) -> Credentials {
        Credentials {
            openai: openai.then(|| "sk-o".to_string()),
            anthropic: anthropic.then(|| "sk-a".to_string()),
            groq: groq.then(|| "gsk".to_string()),
        }
    }

    #[test]
    fn test_missing_credential_skips_rank() {
        // Preference [OpenAI, Groq] but only Groq has a key
        let choice = select_provider(
            "short",
            &[Provider::OpenAi, Provider::Groq],
            &creds(false, false, true),
        )
        .unwrap();
        assert_eq!(choice.provider, Provider::Groq);
    }

    #[test]
    fn test_capacity_overflow_skips_rank() {
        // ~40k tokens: exceeds Groq's 32k ceiling, fits OpenAI
        let text = "x".repeat(160_000);
        let choice = select_provider(
            &text,
            &[Provider::Groq, Provider::OpenAi],
            &creds(true, false, true),
        )
        .unwrap();
        assert_eq!(choice.provider, Provider::OpenAi);
        assert_eq!(choice.model_id, "gpt-4o");
    }

    #[test]
    fn test_model_variant_cutoffs() {
        let small = select_provider("hi", &[Provider::Groq], &creds(false, false, true)).unwrap();
        assert_eq!(small.model_id, "llama3-70b-8192");

        let medium_text = "x".repeat(40_000); // ~10k tokens
        let medium =
            select_provider(&medium_text, &[Provider::Groq], &creds(false, false, true)).unwrap();
        assert_eq!(medium.model_id, "mixtral-8x7b-32768");

        let large_text = "x".repeat(280_000); // ~70k tokens
        let large =
            select_provider(&large_text, &[Provider::OpenAi], &creds(true, false, false)).unwrap();
        assert_eq!(large.model_id, "gpt-4o-mini");
    }

    #[test]
    fn test_no_qualifying_provider_is_none() {
        // No credentials at all
        assert!(select_provider("hi", &[Provider::OpenAi], &creds(false, false, false)).is_none());

        // Credential present but text exceeds every bracket
        let huge = "x".repeat(900_000); // ~225k tokens
        assert!(select_provider(
            &huge,
            &[Provider::OpenAi, Provider::Anthropic, Provider::Groq],
            &creds(true, true, true)
        )
        .is_none());
    }

    #[test]
    fn test_rank_order_respected_when_both_qualify() {
        let choice = select_provider(
            "hi",
            &[Provider::Anthropic, Provider::OpenAi],
            &creds(true, true, false),
        )
        .unwrap();
        assert_eq!(choice.provider, Provider::Anthropic);
        assert_eq!(choice.model_id, "claude-3-5-sonnet-20240620");
    }

    #[test]
    fn test_estimate_is_deterministic() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }
}
