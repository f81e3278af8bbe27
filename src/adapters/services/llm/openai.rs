//! OpenAI LLM service adapter
//!
//! Implements the LlmServicePort for OpenAI's chat completions API.

use super::{failed_response, http_client, transport_error};
use crate::domain::models::TokenUsage;
use crate::error::Result;
use crate::ports::llm::{
    CallMetadata, Completion, LlmConfig, LlmServicePort, ProviderError, ProviderErrorKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI service implementation
pub struct OpenAIService {
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
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

impl From<ChatUsage> for TokenUsage {
    fn from(usage: ChatUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

impl OpenAIService {
    /// Create a new OpenAI service with the given API key
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
        })
    }
}

#[async_trait]
impl LlmServicePort for OpenAIService {
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
        };

        log::info!(
            "Calling OpenAI chat completion with model: {}",
            config.model
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", OPENAI_API_BASE))
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

        let completion_response: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| {
                ProviderError::new(
                    ProviderErrorKind::Upstream,
                    format!("Failed to parse completion response: {}", e),
                    metadata.clone(),
                )
                .with_raw(body.clone())
            })?;

        let text = completion_response
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
            "OpenAI completion successful, generated {} characters",
            text.len()
        );

        Ok(Completion {
            text,
            model: completion_response
                .model
                .unwrap_or_else(|| config.model.clone()),
            token_usage: completion_response.usage.map(TokenUsage::from),
        })
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_service_creation() {
        let service = OpenAIService::new("test_api_key".to_string()).unwrap();
        assert_eq!(service.provider_name(), "openai");
        assert!(service.is_configured());
    }

    #[test]
    fn test_openai_service_not_configured() {
        let service = OpenAIService::new("".to_string()).unwrap();
        assert!(!service.is_configured());
    }

    #[test]
    fn test_response_parsing_with_usage() {
        let body = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"industry\": \"retail\"}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 812, "completion_tokens": 64, "total_tokens": 876}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
        let usage = TokenUsage::from(parsed.usage.unwrap());
        assert_eq!(usage.total_tokens, Some(876));
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"industry\": \"retail\"}")
        );
    }
}
