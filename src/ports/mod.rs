/// Port trait definitions (interfaces)
///
/// These traits define the contracts for adapters to implement.
/// Following the ports-and-adapters (hexagonal) architecture pattern.
pub mod extraction;
pub mod insights;
pub mod llm;
pub mod storage;

#[cfg(test)]
pub mod mocks;

pub use extraction::{ExtractionPort, ProviderSuccess};
pub use insights::InsightsGenerator;
pub use llm::{
    CallMetadata, Completion, LlmConfig, LlmServicePort, ProviderError, ProviderErrorKind,
};
pub use storage::StoragePort;
