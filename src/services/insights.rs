//! Insights generation and caching
//!
//! `InsightsCache` memoizes generated insights by aggregate fingerprint for a
//! bounded time and size. Generation prefers the model-backed generator and
//! falls back to rule-based insights, which never fail.

use crate::domain::insights::{
    AggregateInput, BreakdownRow, InsightsDraft, InsightsResult, InsightsSource,
};
use crate::domain::models::now_millis;
use crate::domain::prompts::PromptTemplates;
use crate::error::{AppError, Result};
use crate::ports::insights::InsightsGenerator;
use crate::ports::llm::{LlmConfig, LlmServicePort};
use crate::services::json_extract::parse_object;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_CAPACITY: usize = 64;

// ═══════════════════════════════════════════
// Rule-based generator
// ═══════════════════════════════════════════

/// Deterministic insights computed from the aggregates alone
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedInsights;

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

impl RuleBasedInsights {
    pub fn build(&self, input: &AggregateInput) -> InsightsDraft {
        let total = input.stage_counts.get("total").copied();
        let closed = input.stage_counts.get("closed").copied();

        let summary = match (total, closed) {
            (Some(total), Some(closed)) if total > 0 => format!(
                "{} of {} meetings closed ({} overall conversion).",
                closed,
                total,
                percent(closed as f64 / total as f64)
            ),
            (Some(total), _) => format!("{} meetings analyzed.", total),
            _ => format!(
                "Aggregates cover {} breakdown table(s).",
                input.breakdowns.len()
            ),
        };

        let mut highlights = Vec::new();
        let mut recommendations = Vec::new();

        for (table, rows) in &input.breakdowns {
            let mut rated: Vec<(&BreakdownRow, f64)> = rows
                .iter()
                .filter_map(|row| row.conversion_rate().map(|rate| (row, rate)))
                .collect();
            if rated.is_empty() {
                continue;
            }
            // Stable sort keeps input order among equal rates
            rated.sort_by(|a, b| b.1.total_cmp(&a.1));

            let (best, best_rate) = rated[0];
            let (worst, worst_rate) = rated[rated.len() - 1];

            if rated.len() == 1 || best_rate == worst_rate {
                highlights.push(format!(
                    "{}: \"{}\" converts at {} ({}/{}).",
                    table,
                    best.label,
                    percent(best_rate),
                    best.closed,
                    best.total
                ));
                continue;
            }

            highlights.push(format!(
                "{}: \"{}\" converts best at {} ({}/{}); \"{}\" worst at {} ({}/{}).",
                table,
                best.label,
                percent(best_rate),
                best.closed,
                best.total,
                worst.label,
                percent(worst_rate),
                worst.closed,
                worst.total
            ));
            recommendations.push(format!(
                "Prioritize \"{}\" in {} and review why \"{}\" underperforms.",
                best.label, table, worst.label
            ));
        }

        if highlights.is_empty() {
            highlights.push("Not enough data for per-segment conversion rates.".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("Extract more meetings to enable segment comparisons.".to_string());
        }

        InsightsDraft {
            summary,
            highlights,
            recommendations,
        }
    }
}

#[async_trait]
impl InsightsGenerator for RuleBasedInsights {
    async fn generate(&self, input: &AggregateInput) -> Result<InsightsDraft> {
        Ok(self.build(input))
    }

    fn source(&self) -> InsightsSource {
        InsightsSource::RuleBased
    }
}

// ═══════════════════════════════════════════
// Model-backed generator
// ═══════════════════════════════════════════

/// Insights written by a model from the serialized aggregates
pub struct LlmInsightsGenerator {
    service: Arc<dyn LlmServicePort>,
    config: LlmConfig,
    timeout: Duration,
}

impl LlmInsightsGenerator {
    pub fn new(service: Arc<dyn LlmServicePort>, config: LlmConfig, timeout: Duration) -> Self {
        Self {
            service,
            config,
            timeout,
        }
    }
}

#[async_trait]
impl InsightsGenerator for LlmInsightsGenerator {
    async fn generate(&self, input: &AggregateInput) -> Result<InsightsDraft> {
        let aggregates = serde_json::to_string_pretty(input)?;
        let prompt = PromptTemplates::build_insights(&aggregates);

        let completion =
            tokio::time::timeout(self.timeout, self.service.complete(&prompt, &self.config))
                .await
                .map_err(|_| {
                    AppError::Other(format!(
                        "Insights generation timed out after {:?}",
                        self.timeout
                    ))
                })?
                .map_err(|e| AppError::Other(e.to_string()))?;

        let value = parse_object(&completion.text).map_err(|e| AppError::Other(e.to_string()))?;
        let draft: InsightsDraft = serde_json::from_value(value)?;
        if draft.summary.trim().is_empty() {
            return Err(AppError::Other("Insights reply has an empty summary".to_string()));
        }
        Ok(draft)
    }

    fn source(&self) -> InsightsSource {
        InsightsSource::Llm
    }
}

// ═══════════════════════════════════════════
// Cache
// ═══════════════════════════════════════════

struct CacheEntry {
    value: InsightsResult,
    inserted_at: Instant,
}

/// Fingerprint-keyed, TTL- and size-bounded insights cache
pub struct InsightsCache {
    primary: Option<Arc<dyn InsightsGenerator>>,
    fallback: RuleBasedInsights,
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InsightsCache {
    pub fn new(primary: Option<Arc<dyn InsightsGenerator>>) -> Self {
        Self {
            primary,
            fallback: RuleBasedInsights,
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Maximum number of entries; zero is treated as one
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // Entries are replaced whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<InsightsResult> {
        let entries = self.lock();
        entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| InsightsResult {
                cached: true,
                ..entry.value.clone()
            })
    }

    fn store(&self, key: String, value: InsightsResult) {
        let mut entries = self.lock();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                log::debug!("Insights cache full, evicting {}", oldest);
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    async fn generate(&self, input: &AggregateInput, use_llm: bool) -> InsightsResult {
        if use_llm {
            if let Some(primary) = &self.primary {
                match primary.generate(input).await {
                    Ok(draft) => {
                        return InsightsResult::from_draft(draft, primary.source(), now_millis())
                    }
                    Err(e) => log::warn!("Insights generator failed, using rule-based: {}", e),
                }
            }
        }

        InsightsResult::from_draft(
            self.fallback.build(input),
            InsightsSource::RuleBased,
            now_millis(),
        )
    }

    /// Insights for `input`, served from cache while fresh.
    ///
    /// Never fails: the rule-based generator covers every primary failure.
    /// Entries are keyed on the fingerprint plus the generator asked for, and
    /// a rule-based stand-in for a failed primary is returned but not cached.
    /// Generation runs outside the lock, so two concurrent misses for the
    /// same key may both generate; the later insert wins.
    pub async fn get_insights(&self, input: &AggregateInput, use_llm: bool) -> InsightsResult {
        let wants_primary = use_llm && self.primary.is_some();
        let key = format!(
            "{}:{}",
            input.fingerprint(),
            if wants_primary { "llm" } else { "rules" }
        );
        if let Some(hit) = self.lookup(&key) {
            log::debug!("Insights cache hit for {}", key);
            return hit;
        }

        log::debug!("Insights cache miss for {}", key);
        let result = self.generate(input, use_llm).await;
        if wants_primary && result.source == InsightsSource::RuleBased {
            log::debug!("Not caching rule-based fallback for {}", key);
        } else {
            self.store(key, result.clone());
        }
        result
    }
}
