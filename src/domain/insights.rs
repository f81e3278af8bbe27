/// Insights data model
///
/// Aggregated reporting data in, narrative insights out.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};

/// One row of a breakdown table (e.g., industry = "retail")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub label: String,
    pub total: u64,
    pub closed: u64,
}

impl BreakdownRow {
    /// closed / total, None when the row is empty
    pub fn conversion_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.closed as f64 / self.total as f64)
        }
    }
}

/// Aggregated extraction data handed to an insights generator
///
/// Ordered maps keep the serialization canonical, so equal inputs always
/// produce the same fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateInput {
    #[serde(default)]
    pub stage_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub breakdowns: BTreeMap<String, Vec<BreakdownRow>>,
}

impl AggregateInput {
    /// Stable cache key: 16 hex digits
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

/// Which generator produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightsSource {
    Llm,
    RuleBased,
}

/// Generator output before the cache stamps it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightsDraft {
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Insights as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResult {
    pub summary: String,
    pub highlights: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: InsightsSource,
    pub cached: bool,
    pub generated_at: i64,
}

impl InsightsResult {
    pub fn from_draft(draft: InsightsDraft, source: InsightsSource, generated_at: i64) -> Self {
        Self {
            summary: draft.summary,
            highlights: draft.highlights,
            recommendations: draft.recommendations,
            source,
            cached: false,
            generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AggregateInput {
        let mut input = AggregateInput::default();
        input.stage_counts.insert("total".to_string(), 10);
        input.stage_counts.insert("closed".to_string(), 4);
        input.breakdowns.insert(
            "industry".to_string(),
            vec![BreakdownRow {
                label: "retail".to_string(),
                total: 6,
                closed: 3,
            }],
        );
        input
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = sample();
        let b = sample();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);

        let mut c = sample();
        c.stage_counts.insert("closed".to_string(), 5);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_aggregate_input_parses_camel_case() {
        let input: AggregateInput = serde_json::from_str(
            r#"{"stageCounts": {"total": 3}, "breakdowns": {"leadSource": [{"label": "referral", "total": 3, "closed": 1}]}}"#,
        )
        .unwrap();
        assert_eq!(input.stage_counts["total"], 3);
        assert_eq!(input.breakdowns["leadSource"][0].closed, 1);
    }

    #[test]
    fn test_conversion_rate() {
        let row = BreakdownRow {
            label: "x".to_string(),
            total: 0,
            closed: 0,
        };
        assert_eq!(row.conversion_rate(), None);
        let row = BreakdownRow {
            label: "x".to_string(),
            total: 4,
            closed: 1,
        };
        assert_eq!(row.conversion_rate(), Some(0.25));
    }
}
