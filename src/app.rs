//! Application wiring
//!
//! Builds storage, providers and services once from a `PipelineConfig` and
//! hands them out by reference.

use crate::adapters::services::llm::create_llm_service;
use crate::adapters::storage::SqliteStorage;
use crate::config::PipelineConfig;
use crate::error::{AppError, Result};
use crate::ports::extraction::ExtractionPort;
use crate::ports::insights::InsightsGenerator;
use crate::ports::llm::LlmConfig;
use crate::ports::storage::StoragePort;
use crate::services::{
    BatchRunner, ExtractionService, InsightsCache, LlmInsightsGenerator, ProviderClient,
};
use crate::utils::keychain::{resolve_api_key, KeychainPort};
use std::sync::Arc;

/// Application state shared by every command
pub struct AppState {
    pub config: PipelineConfig,
    pub storage: Arc<SqliteStorage>,
    pub extraction: Arc<ExtractionService>,
    pub batch: BatchRunner,
    pub insights: InsightsCache,
}

/// Open the database at the configured path and run migrations
pub fn open_storage(config: &PipelineConfig) -> Result<Arc<SqliteStorage>> {
    if let Some(dir) = config.db_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let storage = SqliteStorage::new(&config.db_path)?;
    storage.run_migrations()?;
    log::info!("Database ready at {}", config.db_path.display());
    Ok(Arc::new(storage))
}

impl AppState {
    /// Initialize the application
    ///
    /// Providers whose API key cannot be resolved are skipped; at least one
    /// must remain.
    pub fn initialize(config: PipelineConfig, keychain: &dyn KeychainPort) -> Result<Self> {
        let storage = open_storage(&config)?;

        let mut providers: Vec<Arc<dyn ExtractionPort>> = Vec::new();
        let mut insights_primary: Option<Arc<dyn InsightsGenerator>> = None;

        for spec in &config.providers {
            let Some(api_key) = resolve_api_key(spec.kind.as_str(), keychain) else {
                log::warn!("Skipping provider {}: no API key configured", spec);
                continue;
            };

            let service = create_llm_service(spec.kind, api_key)?;
            let llm_config = LlmConfig {
                model: spec.model.clone(),
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
            };

            if insights_primary.is_none() {
                insights_primary = Some(Arc::new(LlmInsightsGenerator::new(
                    Arc::clone(&service),
                    llm_config.clone(),
                    config.timeout,
                )));
            }

            providers.push(Arc::new(
                ProviderClient::new(service, llm_config).with_timeout(config.timeout),
            ));
            log::info!("Provider {} enabled (position {})", spec, providers.len());
        }

        if providers.is_empty() {
            let wanted = config
                .providers
                .iter()
                .map(|p| p.kind.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::Config(format!(
                "No extraction provider has an API key (tried: {})",
                wanted
            )));
        }

        let storage_port: Arc<dyn StoragePort> = storage.clone();
        let extraction = Arc::new(ExtractionService::new(
            Arc::clone(&storage_port),
            providers,
            config.retry_policy(),
        ));
        let batch = BatchRunner::new(Arc::clone(&extraction), storage_port)
            .with_concurrency(config.concurrency);
        let insights = InsightsCache::new(insights_primary)
            .with_ttl(config.insights_ttl)
            .with_capacity(config.insights_capacity);

        Ok(Self {
            config,
            storage,
            extraction,
            batch,
            insights,
        })
    }
}
