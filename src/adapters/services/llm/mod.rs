//! LLM service adapters
//!
//! Implementations of the LlmServicePort trait for various providers:
//! - OpenAI (GPT-4o family)
//! - Anthropic (Claude)
//! - Google (Gemini)
//! - Groq (Llama, Mixtral, Gemma)

pub mod anthropic;
pub mod google;
pub mod groq;
pub mod openai;

pub use anthropic::AnthropicService;
pub use google::GoogleService;
pub use groq::GroqService;
pub use openai::OpenAIService;

use crate::error::{AppError, Result};
use crate::ports::llm::{CallMetadata, LlmServicePort, ProviderError, ProviderErrorKind};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Transport-level ceiling; the provider client applies the real deadline.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Phrases in an error body that mean "you are out of quota", whatever the status
const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "billing",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "credit balance",
    "resource_exhausted",
];

/// Supported model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Google,
    Groq,
}

impl ProviderKind {
    pub const ALL: &'static [ProviderKind] = &[
        ProviderKind::OpenAI,
        ProviderKind::Anthropic,
        ProviderKind::Google,
        ProviderKind::Groq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::Groq => "groq",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "google" | "gemini" => Ok(ProviderKind::Google),
            "groq" => Ok(ProviderKind::Groq),
            other => Err(AppError::Config(format!(
                "Unknown LLM provider: {}. Must be 'openai', 'anthropic', 'google' or 'groq'",
                other
            ))),
        }
    }
}

/// One entry of the ordered provider list: backend plus model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub model: String,
}

impl fmt::Display for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.model)
    }
}

impl FromStr for ProviderSpec {
    type Err = AppError;

    /// Parses `"kind:model"`; the model may itself contain colons
    fn from_str(s: &str) -> Result<Self> {
        let (kind, model) = s
            .split_once(':')
            .ok_or_else(|| AppError::Config(format!("Expected 'kind:model', got '{}'", s)))?;
        let model = model.trim();
        if model.is_empty() {
            return Err(AppError::Config(format!("Missing model name in '{}'", s)));
        }
        Ok(Self {
            kind: kind.parse()?,
            model: model.to_string(),
        })
    }
}

/// Get an LLM service instance for a backend
pub fn create_llm_service(kind: ProviderKind, api_key: String) -> Result<Arc<dyn LlmServicePort>> {
    let service: Arc<dyn LlmServicePort> = match kind {
        ProviderKind::OpenAI => Arc::new(OpenAIService::new(api_key)?),
        ProviderKind::Anthropic => Arc::new(AnthropicService::new(api_key)?),
        ProviderKind::Google => Arc::new(GoogleService::new(api_key)?),
        ProviderKind::Groq => Arc::new(GroqService::new(api_key)?),
    };
    Ok(service)
}

pub(crate) fn http_client() -> Result<Client> {
    Ok(Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

/// Decide whether a failed response is a quota/rate-limit rejection
pub fn classify_failure(status: Option<StatusCode>, body: &str) -> ProviderErrorKind {
    if matches!(
        status,
        Some(StatusCode::TOO_MANY_REQUESTS) | Some(StatusCode::PAYMENT_REQUIRED)
    ) {
        return ProviderErrorKind::Quota;
    }
    let body = body.to_lowercase();
    if QUOTA_MARKERS.iter().any(|marker| body.contains(marker)) {
        ProviderErrorKind::Quota
    } else {
        ProviderErrorKind::Upstream
    }
}

/// Turn a non-success HTTP response into a classified provider error
pub(crate) async fn failed_response(
    response: reqwest::Response,
    metadata: CallMetadata,
) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let kind = classify_failure(Some(status), &body);
    log::warn!(
        "{} returned {} for model {} ({})",
        metadata.provider,
        status,
        metadata.model,
        kind
    );
    ProviderError::new(kind, format!("HTTP {}", status), metadata).with_raw(body)
}

/// Turn a transport error (connect, TLS, body read) into a provider error
pub(crate) fn transport_error(error: reqwest::Error, metadata: CallMetadata) -> ProviderError {
    let message = error.to_string();
    let kind = classify_failure(error.status(), &message);
    ProviderError::new(kind, format!("Request failed: {}", message), metadata)
        .with_raw(format!("{{\"transport_error\": {:?}}}", message))
}
