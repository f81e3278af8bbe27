/// Extraction port trait
///
/// One configured model backend able to turn a transcript into validated
/// extraction fields. The orchestrator walks an ordered list of these.
use crate::domain::hints::DeterministicHints;
use crate::domain::models::ExtractionFields;
use crate::ports::llm::{CallMetadata, ProviderError};
use async_trait::async_trait;

/// Validated fields plus what the backend actually said
#[derive(Debug, Clone)]
pub struct ProviderSuccess {
    pub fields: ExtractionFields,
    pub raw_response: String,
    pub metadata: CallMetadata,
}

/// Port trait for structured extraction providers
#[async_trait]
pub trait ExtractionPort: Send + Sync {
    /// Extract structured fields from one transcript
    async fn extract(
        &self,
        transcript: &str,
        hints: &DeterministicHints,
    ) -> std::result::Result<ProviderSuccess, ProviderError>;

    /// Provider name written to attempt logs (e.g., "openai")
    fn provider_name(&self) -> &str;

    /// Model name written to attempt logs
    fn model(&self) -> &str;
}
