//! Provider client
//!
//! Turns a raw text-completion backend into an extraction provider: builds the
//! prompt, enforces the deadline, digs the JSON out of the reply and validates
//! it against the field schema. Every failure carries the raw reply and call
//! metadata so the orchestrator can log it.

use crate::domain::hints::DeterministicHints;
use crate::domain::prompts::PromptTemplates;
use crate::domain::schema;
use crate::ports::extraction::{ExtractionPort, ProviderSuccess};
use crate::ports::llm::{CallMetadata, LlmConfig, LlmServicePort, ProviderError, ProviderErrorKind};
use crate::services::json_extract::{parse_object, JsonExtractError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Extraction provider backed by one LLM service and model
pub struct ProviderClient {
    service: Arc<dyn LlmServicePort>,
    config: LlmConfig,
    timeout: Duration,
}

impl ProviderClient {
    pub fn new(service: Arc<dyn LlmServicePort>, config: LlmConfig) -> Self {
        Self {
            service,
            config,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn metadata(&self, duration_ms: u64) -> CallMetadata {
        CallMetadata {
            duration_ms,
            ..CallMetadata::new(self.service.provider_name(), &self.config.model)
        }
    }
}

#[async_trait]
impl ExtractionPort for ProviderClient {
    async fn extract(
        &self,
        transcript: &str,
        hints: &DeterministicHints,
    ) -> Result<ProviderSuccess, ProviderError> {
        let prompt = PromptTemplates::build_extraction(transcript, hints);
        log::debug!(
            "Extraction prompt for {}/{}: {} characters",
            self.provider_name(),
            self.model(),
            prompt.len()
        );

        let started = Instant::now();
        // Dropping the request future on timeout aborts the in-flight HTTP call
        let outcome = tokio::time::timeout(self.timeout, self.service.complete(&prompt, &self.config)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let completion = match outcome {
            Err(_) => {
                let timeout_ms = self.timeout.as_millis();
                return Err(ProviderError::new(
                    ProviderErrorKind::Timeout,
                    format!("No response within {} ms", timeout_ms),
                    self.metadata(duration_ms),
                )
                .with_raw(
                    serde_json::json!({
                        "error": "timeout",
                        "timeoutMs": timeout_ms as u64,
                        "provider": self.provider_name(),
                        "model": self.model(),
                    })
                    .to_string(),
                ));
            }
            Ok(Err(e)) => return Err(e.with_duration(duration_ms)),
            Ok(Ok(completion)) => completion,
        };

        let mut metadata = self.metadata(duration_ms);
        metadata.token_usage = completion.token_usage;
        if completion.model != self.config.model {
            log::debug!(
                "{} served {} for requested model {}",
                self.provider_name(),
                completion.model,
                self.config.model
            );
        }

        let value = parse_object(&completion.text).map_err(|e| {
            let raw = match &e {
                JsonExtractError::NotFound => completion.text.clone(),
                JsonExtractError::Unparseable { candidate, .. } => candidate.clone(),
            };
            ProviderError::new(ProviderErrorKind::Parse, e.to_string(), metadata.clone()).with_raw(raw)
        })?;

        let normalized = schema::normalize(&value).map_err(|diagnostic| {
            ProviderError::new(
                ProviderErrorKind::Validation,
                format!("Schema validation failed: {}", diagnostic),
                metadata.clone(),
            )
            .with_raw(completion.text.clone())
        })?;

        if !normalized.dropped.is_empty() {
            log::warn!(
                "{}/{} returned {} out-of-domain value(s): {}",
                self.provider_name(),
                self.model(),
                normalized.dropped.len(),
                normalized.dropped.join("; ")
            );
        }

        Ok(ProviderSuccess {
            fields: normalized.fields,
            raw_response: completion.text,
            metadata,
        })
    }

    fn provider_name(&self) -> &str {
        self.service.provider_name()
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
