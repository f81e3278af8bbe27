//! Pipeline configuration
//!
//! Read from `LEAD_SCRIBE_*` environment variables; anything unset takes its
//! default. API keys are not part of this struct (see `utils::keychain`).

use crate::adapters::services::llm::ProviderSpec;
use crate::error::{AppError, Result};
use crate::services::{batch, insights, provider_client, retry};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PROVIDERS: &str = "openai:gpt-4o-mini,anthropic:claude-3-5-haiku-latest";
const DB_FILE: &str = "lead-scribe.db";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub db_path: PathBuf,
    /// Fallback order: first entry is tried first
    pub providers: Vec<ProviderSpec>,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub concurrency: usize,
    pub insights_ttl: Duration,
    pub insights_capacity: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            providers: parse_providers(DEFAULT_PROVIDERS).unwrap_or_default(),
            timeout: provider_client::DEFAULT_TIMEOUT,
            max_attempts: retry::DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: retry::DEFAULT_BASE_DELAY,
            concurrency: batch::DEFAULT_CONCURRENCY,
            insights_ttl: insights::DEFAULT_TTL,
            insights_capacity: insights::DEFAULT_CAPACITY,
            temperature: 0.0,
            max_tokens: 1500,
        }
    }
}

/// `<data dir>/lead-scribe/lead-scribe.db`, or the working directory when
/// the platform has no data dir
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("lead-scribe").join(DB_FILE))
        .unwrap_or_else(|| PathBuf::from(DB_FILE))
}

/// Parse a comma-separated `kind:model` list
pub fn parse_providers(list: &str) -> Result<Vec<ProviderSpec>> {
    let specs = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ProviderSpec::from_str)
        .collect::<Result<Vec<_>>>()?;
    if specs.is_empty() {
        return Err(AppError::Config("Provider list is empty".to_string()));
    }
    Ok(specs)
}

fn parsed<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("Invalid {}='{}': {}", name, raw, e))),
    }
}

impl PipelineConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get("LEAD_SCRIBE_DB") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(list) = get("LEAD_SCRIBE_PROVIDERS") {
            config.providers = parse_providers(&list)?;
        }
        if let Some(secs) = parsed::<u64>("LEAD_SCRIBE_TIMEOUT_SECS", get("LEAD_SCRIBE_TIMEOUT_SECS"))? {
            if secs == 0 {
                return Err(AppError::Config("LEAD_SCRIBE_TIMEOUT_SECS must be positive".to_string()));
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parsed::<u32>("LEAD_SCRIBE_MAX_ATTEMPTS", get("LEAD_SCRIBE_MAX_ATTEMPTS"))? {
            if n == 0 {
                return Err(AppError::Config("LEAD_SCRIBE_MAX_ATTEMPTS must be at least 1".to_string()));
            }
            config.max_attempts = n;
        }
        if let Some(ms) = parsed::<u64>("LEAD_SCRIBE_RETRY_BASE_MS", get("LEAD_SCRIBE_RETRY_BASE_MS"))? {
            config.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parsed::<usize>("LEAD_SCRIBE_CONCURRENCY", get("LEAD_SCRIBE_CONCURRENCY"))? {
            if n == 0 {
                return Err(AppError::Config("LEAD_SCRIBE_CONCURRENCY must be at least 1".to_string()));
            }
            config.concurrency = n;
        }
        if let Some(secs) =
            parsed::<u64>("LEAD_SCRIBE_INSIGHTS_TTL_SECS", get("LEAD_SCRIBE_INSIGHTS_TTL_SECS"))?
        {
            config.insights_ttl = Duration::from_secs(secs);
        }
        if let Some(n) =
            parsed::<usize>("LEAD_SCRIBE_INSIGHTS_CAPACITY", get("LEAD_SCRIBE_INSIGHTS_CAPACITY"))?
        {
            if n == 0 {
                return Err(AppError::Config(
                    "LEAD_SCRIBE_INSIGHTS_CAPACITY must be at least 1".to_string(),
                ));
            }
            config.insights_capacity = n;
        }
        if let Some(t) = parsed::<f32>("LEAD_SCRIBE_TEMPERATURE", get("LEAD_SCRIBE_TEMPERATURE"))? {
            if !(0.0..=2.0).contains(&t) {
                return Err(AppError::Config(format!(
                    "LEAD_SCRIBE_TEMPERATURE must be between 0 and 2, got {}",
                    t
                )));
            }
            config.temperature = t;
        }
        if let Some(n) = parsed::<u32>("LEAD_SCRIBE_MAX_TOKENS", get("LEAD_SCRIBE_MAX_TOKENS"))? {
            config.max_tokens = n;
        }

        Ok(config)
    }

    pub fn retry_policy(&self) -> retry::RetryPolicy {
        retry::RetryPolicy::new(self.max_attempts, self.retry_base_delay)
    }
}
