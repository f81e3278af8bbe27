//! Extraction orchestrator
//!
//! Drives one meeting through hint extraction, the provider fallback chain,
//! the merge rule and persistence. Provider failures never escape this
//! module: they become attempt-log rows and, when every provider fails, a
//! `Failed` outcome returned as a normal value.

use crate::domain::hints::DeterministicHints;
use crate::domain::merge;
use crate::domain::models::{
    now_millis, ExtractionOutcome, ExtractionRecord, ExtractionState, ExtractionStatus,
    ProviderAttemptLog,
};
use crate::error::{AppError, Result};
use crate::ports::extraction::{ExtractionPort, ProviderSuccess};
use crate::ports::llm::ProviderError;
use crate::ports::storage::StoragePort;
use crate::services::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Extraction service for single meetings
pub struct ExtractionService {
    storage: Arc<dyn StoragePort>,
    providers: Vec<Arc<dyn ExtractionPort>>,
    retry: RetryPolicy,
    states: Arc<Mutex<HashMap<i64, ExtractionState>>>,
}

/// Marks a meeting Running for as long as it lives.
///
/// On drop the final state is recorded, or the entry is cleared when the run
/// ended early (storage error or cancelled future).
struct RunGuard {
    states: Arc<Mutex<HashMap<i64, ExtractionState>>>,
    meeting_id: i64,
    finished: Option<ExtractionState>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut states) = self.states.lock() {
            match self.finished {
                Some(state) => {
                    states.insert(self.meeting_id, state);
                }
                None => {
                    states.remove(&self.meeting_id);
                }
            }
        }
    }
}

impl ExtractionService {
    /// Providers are tried in the given order
    pub fn new(
        storage: Arc<dyn StoragePort>,
        providers: Vec<Arc<dyn ExtractionPort>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            storage,
            providers,
            retry,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    fn begin(&self, meeting_id: i64) -> Result<RunGuard> {
        let mut states = self
            .states
            .lock()
            .map_err(|_| AppError::Other("Extraction state map poisoned".to_string()))?;
        if states.get(&meeting_id) == Some(&ExtractionState::Running) {
            return Err(AppError::AlreadyRunning(meeting_id));
        }
        states.insert(meeting_id, ExtractionState::Running);
        Ok(RunGuard {
            states: Arc::clone(&self.states),
            meeting_id,
            finished: None,
        })
    }

    /// Current state of a meeting: in-process runtime state first, then the
    /// stored record, otherwise NotStarted
    pub async fn state(&self, meeting_id: i64) -> Result<ExtractionState> {
        let runtime = self
            .states
            .lock()
            .map_err(|_| AppError::Other("Extraction state map poisoned".to_string()))?
            .get(&meeting_id)
            .copied();
        if let Some(state) = runtime {
            return Ok(state);
        }

        Ok(self
            .storage
            .get_extraction(meeting_id)
            .await?
            .map(|record| ExtractionState::from(record.status))
            .unwrap_or(ExtractionState::NotStarted))
    }

    /// Run the full pipeline for one meeting and upsert its extraction
    pub async fn run_extraction(&self, meeting_id: i64) -> Result<ExtractionOutcome> {
        let transcript = self
            .storage
            .get_transcript(meeting_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transcript for meeting {}", meeting_id)))?;

        let mut guard = self.begin(meeting_id)?;
        log::info!(
            "Extracting meeting {} ({} characters, {} provider(s))",
            meeting_id,
            transcript.text.len(),
            self.providers.len()
        );

        let hints = DeterministicHints::extract(&transcript.text);
        log::debug!(
            "Hints for meeting {}: leadSource={} ({:.2}), volume={:?} ({:.2}), integrations={:?}",
            meeting_id,
            hints.lead_source.source,
            hints.lead_source.confidence,
            hints.volume.volume,
            hints.volume.confidence,
            hints.integrations.integrations
        );

        let mut failures: Vec<(Arc<dyn ExtractionPort>, ProviderError)> = Vec::new();
        let mut success: Option<(Arc<dyn ExtractionPort>, ProviderSuccess)> = None;

        for provider in &self.providers {
            let label = format!("{}/{}", provider.provider_name(), provider.model());
            let result = self
                .retry
                .run(&label, |_| provider.extract(&transcript.text, &hints))
                .await;

            match result {
                Ok(extracted) => {
                    success = Some((Arc::clone(provider), extracted));
                    break;
                }
                Err(e) => {
                    log::warn!("Meeting {}: {} failed, trying next provider: {}", meeting_id, label, e);
                    failures.push((Arc::clone(provider), e));
                }
            }
        }

        for (provider, error) in &failures {
            self.storage
                .insert_attempt(&failed_attempt(meeting_id, provider.as_ref(), error))
                .await?;
        }

        let outcome = match success {
            Some((provider, extracted)) => {
                self.storage
                    .insert_attempt(&succeeded_attempt(meeting_id, provider.as_ref(), &extracted))
                    .await?;

                let merged = merge::merge(&hints, extracted.fields);
                let record = ExtractionRecord::succeeded(
                    meeting_id,
                    provider.model().to_string(),
                    merged.clone(),
                );
                self.storage.upsert_extraction(&record).await?;

                log::info!(
                    "Meeting {} extracted by {}/{} after {} failed provider(s)",
                    meeting_id,
                    provider.provider_name(),
                    provider.model(),
                    failures.len()
                );

                ExtractionOutcome {
                    meeting_id,
                    extraction: Some(merged),
                    status: ExtractionStatus::Succeeded,
                    model: Some(provider.model().to_string()),
                    error: None,
                }
            }
            None => {
                let error = failures
                    .last()
                    .map(|(_, e)| e.to_string())
                    .unwrap_or_else(|| "No extraction providers configured".to_string());
                self.storage
                    .upsert_extraction(&ExtractionRecord::failed(meeting_id, error.clone()))
                    .await?;

                log::warn!(
                    "Meeting {}: all {} provider(s) exhausted: {}",
                    meeting_id,
                    failures.len(),
                    error
                );

                ExtractionOutcome {
                    meeting_id,
                    extraction: None,
                    status: ExtractionStatus::Failed,
                    model: None,
                    error: Some(error),
                }
            }
        };

        guard.finished = Some(outcome.status.into());
        Ok(outcome)
    }
}

fn failed_attempt(
    meeting_id: i64,
    provider: &dyn ExtractionPort,
    error: &ProviderError,
) -> ProviderAttemptLog {
    ProviderAttemptLog {
        id: None,
        meeting_id,
        provider: provider.provider_name().to_string(),
        model: provider.model().to_string(),
        status: ExtractionStatus::Failed,
        raw_response: error.raw_response.clone(),
        duration_ms: error.metadata.duration_ms,
        token_usage: error.metadata.token_usage,
        error: Some(error.to_string()),
        created_at: now_millis(),
    }
}

fn succeeded_attempt(
    meeting_id: i64,
    provider: &dyn ExtractionPort,
    extracted: &ProviderSuccess,
) -> ProviderAttemptLog {
    ProviderAttemptLog {
        id: None,
        meeting_id,
        provider: provider.provider_name().to_string(),
        model: provider.model().to_string(),
        status: ExtractionStatus::Succeeded,
        raw_response: Some(extracted.raw_response.clone()),
        duration_ms: extracted.metadata.duration_ms,
        token_usage: extracted.metadata.token_usage,
        error: None,
        created_at: now_millis(),
    }
}
