//! Mock implementations for testing

use crate::domain::hints::DeterministicHints;
use crate::domain::insights::{AggregateInput, InsightsDraft, InsightsSource};
use crate::domain::models::{
    ExtractionFields, ExtractionRecord, ExtractionStatus, Meeting, ProviderAttemptLog,
    TokenUsage, Transcript,
};
use crate::error::{AppError, Result};
use crate::ports::extraction::{ExtractionPort, ProviderSuccess};
use crate::ports::insights::InsightsGenerator;
use crate::ports::llm::{
    CallMetadata, Completion, LlmConfig, LlmServicePort, ProviderError, ProviderErrorKind,
};
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock storage implementation for testing
#[derive(Clone, Default)]
pub struct MockStorage {
    meetings: Arc<Mutex<HashMap<i64, Meeting>>>,
    extractions: Arc<Mutex<HashMap<i64, ExtractionRecord>>>,
    attempts: Arc<Mutex<Vec<ProviderAttemptLog>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        *id
    }

    /// Convenience for tests: store a meeting with the given transcript
    pub async fn seed(&self, transcript: &str) -> i64 {
        self.create_meeting(&Meeting::new("Acme".to_string(), transcript.to_string()))
            .await
            .unwrap()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl StoragePort for MockStorage {
    async fn create_meeting(&self, meeting: &Meeting) -> Result<i64> {
        let id = self.next_id();
        let mut m = meeting.clone();
        m.id = Some(id);
        self.meetings.lock().unwrap().insert(id, m);
        Ok(id)
    }

    async fn get_meeting(&self, id: i64) -> Result<Option<Meeting>> {
        Ok(self.meetings.lock().unwrap().get(&id).cloned())
    }

    async fn get_transcript(&self, meeting_id: i64) -> Result<Option<Transcript>> {
        Ok(self
            .meetings
            .lock()
            .unwrap()
            .get(&meeting_id)
            .map(|m| Transcript {
                meeting_id,
                text: m.transcript.clone(),
            }))
    }

    async fn upsert_extraction(&self, record: &ExtractionRecord) -> Result<i64> {
        let mut extractions = self.extractions.lock().unwrap();
        let id = match extractions.get(&record.meeting_id) {
            Some(existing) => existing.id.unwrap_or_default(),
            None => self.next_id(),
        };
        let mut stored = record.clone();
        stored.id = Some(id);
        if let Some(existing) = extractions.get(&record.meeting_id) {
            stored.created_at = existing.created_at;
        }
        extractions.insert(record.meeting_id, stored);
        Ok(id)
    }

    async fn get_extraction(&self, meeting_id: i64) -> Result<Option<ExtractionRecord>> {
        Ok(self.extractions.lock().unwrap().get(&meeting_id).cloned())
    }

    async fn count_extractions(&self, meeting_id: i64) -> Result<usize> {
        Ok(usize::from(
            self.extractions.lock().unwrap().contains_key(&meeting_id),
        ))
    }

    async fn insert_attempt(&self, attempt: &ProviderAttemptLog) -> Result<i64> {
        let id = self.next_id();
        let mut a = attempt.clone();
        a.id = Some(id);
        self.attempts.lock().unwrap().push(a);
        Ok(id)
    }

    async fn list_attempts(&self, meeting_id: i64) -> Result<Vec<ProviderAttemptLog>> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.meeting_id == meeting_id)
            .cloned()
            .collect())
    }

    async fn list_pending_meeting_ids(&self) -> Result<Vec<i64>> {
        let extractions = self.extractions.lock().unwrap();
        let mut ids: Vec<i64> = self
            .meetings
            .lock()
            .unwrap()
            .keys()
            .filter(|id| !extractions.contains_key(id))
            .copied()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn list_failed_unresolved_meeting_ids(&self) -> Result<Vec<i64>> {
        let attempts = self.attempts.lock().unwrap();
        let mut ids: Vec<i64> = self
            .extractions
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == ExtractionStatus::Failed)
            .filter(|r| {
                !attempts.iter().any(|a| {
                    a.meeting_id == r.meeting_id
                        && a.status == ExtractionStatus::Succeeded
                        && a.created_at > r.updated_at
                })
            })
            .map(|r| r.meeting_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// One scripted reply from [`MockLlm`]
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(ProviderErrorKind),
}

/// Scripted LLM backend
///
/// Replies are consumed in order; once the script runs out the fallback
/// reply is repeated.
pub struct MockLlm {
    name: String,
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockLlm {
    pub fn replying(name: &str, text: &str) -> Self {
        Self::scripted(name, vec![], MockReply::Text(text.to_string()))
    }

    pub fn failing(name: &str, kind: ProviderErrorKind) -> Self {
        Self::scripted(name, vec![], MockReply::Fail(kind))
    }

    pub fn scripted(name: &str, script: Vec<MockReply>, fallback: MockReply) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmServicePort for MockLlm {
    async fn complete(
        &self,
        _prompt: &str,
        config: &LlmConfig,
    ) -> std::result::Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            MockReply::Text(text) => Ok(Completion {
                text,
                model: config.model.clone(),
                token_usage: Some(TokenUsage {
                    prompt_tokens: Some(100),
                    completion_tokens: Some(20),
                    total_tokens: Some(120),
                }),
            }),
            MockReply::Fail(kind) => Err(ProviderError::new(
                kind,
                format!("scripted {} failure", self.name),
                CallMetadata::new(&self.name, &config.model),
            )
            .with_raw("{\"error\": \"scripted\"}")),
        }
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Shared in-flight counter used to observe peak concurrency across providers
#[derive(Clone, Default)]
pub struct ConcurrencyGauge {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted extraction provider that skips prompting and parsing entirely
pub struct MockProvider {
    name: String,
    model: String,
    outcome: std::result::Result<ExtractionFields, ProviderErrorKind>,
    /// Transcripts containing this marker fail with Upstream
    fail_marker: Option<String>,
    delay: Option<Duration>,
    gauge: Option<ConcurrencyGauge>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn succeeding(name: &str, model: &str, fields: ExtractionFields) -> Self {
        Self::build(name, model, Ok(fields))
    }

    pub fn failing(name: &str, model: &str, kind: ProviderErrorKind) -> Self {
        Self::build(name, model, Err(kind))
    }

    fn build(
        name: &str,
        model: &str,
        outcome: std::result::Result<ExtractionFields, ProviderErrorKind>,
    ) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            outcome,
            fail_marker: None,
            delay: None,
            gauge: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_gauge(mut self, gauge: ConcurrencyGauge) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionPort for MockProvider {
    async fn extract(
        &self,
        transcript: &str,
        _hints: &DeterministicHints,
    ) -> std::result::Result<ProviderSuccess, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gauge) = &self.gauge {
            gauge.leave();
        }

        let metadata = CallMetadata {
            duration_ms: 5,
            ..CallMetadata::new(&self.name, &self.model)
        };

        let marked = self
            .fail_marker
            .as_deref()
            .is_some_and(|marker| transcript.contains(marker));
        if marked {
            return Err(ProviderError::new(
                ProviderErrorKind::Upstream,
                "marked transcript",
                metadata,
            )
            .with_raw("{}"));
        }

        match &self.outcome {
            Ok(fields) => Ok(ProviderSuccess {
                fields: fields.clone(),
                raw_response: serde_json::to_string(fields).unwrap(),
                metadata,
            }),
            Err(kind) => Err(ProviderError::new(
                *kind,
                format!("{} always fails", self.name),
                metadata,
            )
            .with_raw("not json")),
        }
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Insights generator that counts invocations
#[derive(Default)]
pub struct MockInsightsGenerator {
    pub fail: bool,
    calls: AtomicUsize,
}

impl MockInsightsGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InsightsGenerator for MockInsightsGenerator {
    async fn generate(&self, input: &AggregateInput) -> Result<InsightsDraft> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Other("generator unavailable".to_string()));
        }
        Ok(InsightsDraft {
            summary: format!("{} stages analyzed", input.stage_counts.len()),
            highlights: vec!["mock highlight".to_string()],
            recommendations: vec!["mock recommendation".to_string()],
        })
    }

    fn source(&self) -> InsightsSource {
        InsightsSource::Llm
    }
}
