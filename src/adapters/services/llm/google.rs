//! Google Gemini LLM service adapter
//!
//! Implements the LlmServicePort for Google's Gemini `generateContent` API

use super::{failed_response, http_client, transport_error};
use crate::domain::models::TokenUsage;
use crate::error::Result;
use crate::ports::llm::{
    CallMetadata, Completion, LlmConfig, LlmServicePort, ProviderError, ProviderErrorKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini service implementation
pub struct GoogleService {
    client: Client,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

impl GoogleService {
    /// Create a new Google Gemini service with the given API key
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
        })
    }

    /// Accept both "gemini-1.5-flash" and "models/gemini-1.5-flash"
    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        }
    }
}

#[async_trait]
impl LlmServicePort for GoogleService {
    async fn complete(
        &self,
        prompt: &str,
        config: &LlmConfig,
    ) -> std::result::Result<Completion, ProviderError> {
        let metadata = CallMetadata::new(self.provider_name(), &config.model);

        let request_body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_tokens,
                response_mime_type: "application/json",
            }),
        };

        let model_path = Self::model_path(&config.model);
        log::info!("Calling Google generateContent with model: {}", model_path);

        let response = self
            .client
            .post(format!("{}/{}:generateContent", GOOGLE_API_BASE, model_path))
            .query(&[("key", &self.api_key)])
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| transport_error(e.without_url(), metadata.clone()))?;

        if !response.status().is_success() {
            return Err(failed_response(response, metadata).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e.without_url(), metadata.clone()))?;

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::new(
                ProviderErrorKind::Upstream,
                format!("Failed to parse content response: {}", e),
                metadata.clone(),
            )
            .with_raw(body.clone())
        })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                ProviderError::new(
                    ProviderErrorKind::Upstream,
                    "No candidates returned",
                    metadata.clone(),
                )
                .with_raw(body.clone())
            })?;

        log::info!(
            "Google completion successful, generated {} characters",
            text.len()
        );

        Ok(Completion {
            text,
            model: parsed
                .model_version
                .unwrap_or_else(|| config.model.clone()),
            token_usage: parsed.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
        })
    }

    fn provider_name(&self) -> &str {
        "google"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_service_creation() {
        let service = GoogleService::new("test_api_key".to_string()).unwrap();
        assert_eq!(service.provider_name(), "google");
        assert!(service.is_configured());
    }

    #[test]
    fn test_google_service_not_configured() {
        let service = GoogleService::new("".to_string()).unwrap();
        assert!(!service.is_configured());
    }

    #[test]
    fn test_model_path() {
        assert_eq!(
            GoogleService::model_path("gemini-1.5-flash"),
            "models/gemini-1.5-flash"
        );
        assert_eq!(
            GoogleService::model_path("models/gemini-1.5-pro"),
            "models/gemini-1.5-pro"
        );
    }

    #[test]
    fn test_generation_config_is_camel_case() {
        let config = GenerationConfig {
            temperature: Some(0.0),
            max_output_tokens: Some(1500),
            response_mime_type: "application/json",
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["maxOutputTokens"], 1500);
        assert_eq!(value["responseMimeType"], "application/json");
    }
}
