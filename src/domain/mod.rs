/// Domain layer - core business models and pure pipeline logic
///
/// Nothing in here performs I/O; adapters and services build on it.
pub mod hints;
pub mod insights;
pub mod merge;
pub mod models;
pub mod prompts;
pub mod schema;

pub use hints::DeterministicHints;
pub use insights::{AggregateInput, InsightsResult, InsightsSource};
pub use models::{
    BatchJobResult, BatchMode, ExtractionFields, ExtractionOutcome, ExtractionRecord,
    ExtractionState, ExtractionStatus, Meeting, ProviderAttemptLog, TokenUsage, Transcript,
};
pub use prompts::PromptTemplates;
