/// Insights generator port trait
///
/// Implementations: model-backed generator, rule-based generator.
use crate::domain::insights::{AggregateInput, InsightsDraft, InsightsSource};
use crate::error::Result;
use async_trait::async_trait;

/// Port trait for insights generation over aggregated data
#[async_trait]
pub trait InsightsGenerator: Send + Sync {
    /// Produce narrative insights for one aggregate snapshot
    async fn generate(&self, input: &AggregateInput) -> Result<InsightsDraft>;

    /// Source tag stamped on results from this generator
    fn source(&self) -> InsightsSource;
}
