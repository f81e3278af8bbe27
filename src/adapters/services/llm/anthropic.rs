//! Anthropic LLM service adapter
//!
//! Implements the LlmServicePort for Anthropic's messages API (Claude models)

use super::{failed_response, http_client, transport_error};
use crate::domain::models::TokenUsage;
use crate::error::Result;
use crate::ports::llm::{
    CallMetadata, Completion, LlmConfig, LlmServicePort, ProviderError, ProviderErrorKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const SYSTEM_PROMPT: &str = "You reply with a single JSON object and nothing else.";

/// Anthropic service implementation
pub struct AnthropicService {
    client: Client,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    system: &'static str,
    messages: Vec<Message>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: Some(usage.input_tokens),
            completion_tokens: Some(usage.output_tokens),
            total_tokens: Some(usage.input_tokens + usage.output_tokens),
        }
    }
}

impl AnthropicService {
    /// Create a new Anthropic service with the given API key
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
        })
    }

    /// Concatenate every text block; tool or thinking blocks are ignored
    fn collect_text(blocks: Vec<ContentBlock>) -> String {
        blocks
            .into_iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[async_trait]
impl LlmServicePort for AnthropicService {
    async fn complete(
        &self,
        prompt: &str,
        config: &LlmConfig,
    ) -> std::result::Result<Completion, ProviderError> {
        let metadata = CallMetadata::new(self.provider_name(), &config.model);

        // Anthropic requires max_tokens to be specified
        let max_tokens = config.max_tokens.unwrap_or(4096);

        let request_body = MessagesRequest {
            model: config.model.clone(),
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
            temperature: config.temperature,
        };

        log::info!(
            "Calling Anthropic messages API with model: {}",
            config.model
        );

        let response = self
            .client
            .post(format!("{}/messages", ANTHROPIC_API_BASE))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
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

        let messages_response: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::new(
                ProviderErrorKind::Upstream,
                format!("Failed to parse messages response: {}", e),
                metadata.clone(),
            )
            .with_raw(body.clone())
        })?;

        let text = Self::collect_text(messages_response.content);
        if text.is_empty() {
            return Err(ProviderError::new(
                ProviderErrorKind::Upstream,
                "No text content blocks returned",
                metadata,
            )
            .with_raw(body));
        }

        log::info!(
            "Anthropic completion successful, generated {} characters",
            text.len()
        );

        Ok(Completion {
            text,
            model: messages_response
                .model
                .unwrap_or_else(|| config.model.clone()),
            token_usage: messages_response.usage.map(TokenUsage::from),
        })
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
