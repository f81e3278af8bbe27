/// LLM service port trait
///
/// Defines the raw text-completion interface for Large Language Model services.
/// Implementations: OpenAI, Anthropic, Google, Groq.
use crate::domain::models::TokenUsage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for LLM requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name (e.g., "gpt-4o-mini", "claude-3-5-haiku-latest")
    pub model: String,

    /// Temperature for generation (0.0 to 1.0)
    pub temperature: Option<f32>,

    /// Maximum tokens in response
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.0), // Extraction wants repeatable output
            max_tokens: Some(1500),
        }
    }
}

/// Raw text returned by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Model name as reported by the backend (falls back to the requested one)
    pub model: String,
    pub token_usage: Option<TokenUsage>,
}

/// Classification of a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The call did not finish before the deadline
    Timeout,
    /// No JSON object found, or it could not be repaired
    Parse,
    /// JSON parsed but did not satisfy the field schema
    Validation,
    /// Rate limit, quota or billing rejection
    Quota,
    /// Any other backend or transport failure
    Upstream,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderErrorKind::Timeout => "ProviderTimeout",
            ProviderErrorKind::Parse => "ProviderParseError",
            ProviderErrorKind::Validation => "ProviderValidationError",
            ProviderErrorKind::Quota => "ProviderQuotaError",
            ProviderErrorKind::Upstream => "ProviderUpstreamError",
        };
        f.write_str(name)
    }
}

/// Who was called, and what it cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub provider: String,
    pub model: String,
    pub duration_ms: u64,
    pub token_usage: Option<TokenUsage>,
}

impl CallMetadata {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            duration_ms: 0,
            token_usage: None,
        }
    }
}

/// A failed provider call
///
/// Always carries the raw response (or a synthesized blob) and call metadata
/// so the failure can be written to the attempt log.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} ({}/{}): {message}", .metadata.provider, .metadata.model)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub raw_response: Option<String>,
    pub metadata: CallMetadata,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>, metadata: CallMetadata) -> Self {
        Self {
            kind,
            message: message.into(),
            raw_response: None,
            metadata,
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw_response = Some(raw.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.metadata.duration_ms = duration_ms;
        self
    }
}

/// Port trait for LLM services
#[async_trait]
pub trait LlmServicePort: Send + Sync {
    /// Send one prompt and return the raw completion text
    async fn complete(
        &self,
        prompt: &str,
        config: &LlmConfig,
    ) -> std::result::Result<Completion, ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Check if the service is configured (has API key)
    fn is_configured(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new(
            ProviderErrorKind::Quota,
            "insufficient_quota",
            CallMetadata::new("openai", "gpt-4o-mini"),
        );
        assert_eq!(
            err.to_string(),
            "ProviderQuotaError (openai/gpt-4o-mini): insufficient_quota"
        );
    }

    #[test]
    fn test_provider_error_builders() {
        let err = ProviderError::new(
            ProviderErrorKind::Parse,
            "no JSON object",
            CallMetadata::new("groq", "llama"),
        )
        .with_raw("sorry, I cannot help")
        .with_duration(42);
        assert_eq!(err.raw_response.as_deref(), Some("sorry, I cannot help"));
        assert_eq!(err.metadata.duration_ms, 42);
    }
}
