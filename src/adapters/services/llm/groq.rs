//! Groq LLM service adapter
//!
//! Implements the LlmServicePort for Groq's API
//! Uses the OpenAI-compatible endpoint with JSON mode enabled, since every
//! prompt this crate sends asks for a single JSON object.

use super::{failed_response, http_client, transport_error};
use crate::domain::models::TokenUsage;
use crate::error::Result;
use crate::ports::llm::{
    CallMetadata, Completion, LlmConfig, LlmServicePort, ProviderError, ProviderErrorKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Groq service implementation
pub struct GroqService {
    client: Client,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<GroqUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct GroqUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

impl GroqService {
    /// Create a new Groq service with the given API key
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
        })
    }
}

#[async_trait]
impl LlmServicePort for GroqService {
    async fn complete(
        &self,
        prompt: &str,
        config: &LlmConfig,
    ) -> std::result::Result<Completion, ProviderError> {
        let metadata = CallMetadata::new(self.provider_name(), &config.model);

        let request_body = ChatCompletionRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        log::info!("Calling Groq chat completion with model: {}", config.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", GROQ_API_BASE))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| transport_error(e, metadata.clone()))?;

        if !response.status().is_success() {
            return Err(failed_response(response, metadata).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, metadata.clone()))?;

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::new(
                ProviderErrorKind::Upstream,
                format!("Failed to parse completion response: {}", e),
                metadata.clone(),
            )
            .with_raw(body.clone())
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::new(
                    ProviderErrorKind::Upstream,
                    "No completion choices returned",
                    metadata.clone(),
                )
                .with_raw(body.clone())
            })?;

        log::info!(
            "Groq completion successful, generated {} characters",
            text.len()
        );

        Ok(Completion {
            text,
            model: parsed.model.unwrap_or_else(|| config.model.clone()),
            token_usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    fn provider_name(&self) -> &str {
        "groq"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
