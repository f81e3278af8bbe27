//! Pipeline services
//!
//! Orchestration built on the ports: provider client, retry, per-meeting
//! extraction, batch runs and cached insights.
pub mod batch;
pub mod insights;
pub mod json_extract;
pub mod orchestrator;
pub mod provider_client;
pub mod retry;

pub use batch::BatchRunner;
pub use insights::{InsightsCache, LlmInsightsGenerator, RuleBasedInsights};
pub use orchestrator::ExtractionService;
pub use provider_client::ProviderClient;
pub use retry::RetryPolicy;
