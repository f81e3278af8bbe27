//! Field schema for extraction output
//!
//! One declaration of every output field drives both the schema block
//! embedded in the extraction prompt and the normalization pass applied to
//! whatever a provider returns.

use crate::domain::models::{
    BuyerRole, CompanySize, ExtractionFields, Industry, Integration, JobToBeDone, LeadSource,
    Objection, PainPoint, Sentiment, SuccessMetric, Urgency, VolumeUnit,
};
use serde_json::{Map, Value};

/// Shape of an output field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A single enum value or null
    Scalar,
    /// A set of enum values, possibly empty
    List,
    /// `{quantity, unit, isPeak}` where `unit` is the enum
    Volume,
}

/// Declaration of one output field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub allowed: fn() -> Vec<&'static str>,
    pub guidance: &'static str,
}

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "industry",
        kind: FieldKind::Scalar,
        allowed: Industry::names,
        guidance: "The prospect's main line of business.",
    },
    FieldSpec {
        name: "companySize",
        kind: FieldKind::Scalar,
        allowed: CompanySize::names,
        guidance: "Infer from headcount, branches or customer base; null if not discussed.",
    },
    FieldSpec {
        name: "painPoints",
        kind: FieldKind::List,
        allowed: PainPoint::names,
        guidance: "Every problem the prospect says they have today.",
    },
    FieldSpec {
        name: "leadSource",
        kind: FieldKind::Scalar,
        allowed: LeadSource::names,
        guidance: "How they first heard about us. Use \"unknown\" only if it is never mentioned.",
    },
    FieldSpec {
        name: "volume",
        kind: FieldKind::Volume,
        allowed: VolumeUnit::names,
        guidance: "Interaction volume as {\"quantity\": integer, \"unit\": one of the allowed units, \"isPeak\": true when the figure refers to a peak or high season}.",
    },
    FieldSpec {
        name: "integrations",
        kind: FieldKind::List,
        allowed: Integration::names,
        guidance: "Systems they need connected.",
    },
    FieldSpec {
        name: "urgency",
        kind: FieldKind::Scalar,
        allowed: Urgency::names,
        guidance: "How soon they need a solution; critical means an active deadline or crisis.",
    },
    FieldSpec {
        name: "sentiment",
        kind: FieldKind::Scalar,
        allowed: Sentiment::names,
        guidance: "The prospect's overall attitude toward the product by the end of the call.",
    },
    FieldSpec {
        name: "jtbdPrimary",
        kind: FieldKind::List,
        allowed: JobToBeDone::names,
        guidance: "The main jobs they want the product to do, most important first.",
    },
    FieldSpec {
        name: "successMetrics",
        kind: FieldKind::List,
        allowed: SuccessMetric::names,
        guidance: "How they will judge success.",
    },
    FieldSpec {
        name: "objections",
        kind: FieldKind::List,
        allowed: Objection::names,
        guidance: "Concerns or blockers raised.",
    },
    FieldSpec {
        name: "buyerRole",
        kind: FieldKind::Scalar,
        allowed: BuyerRole::names,
        guidance: "Role of the prospect-side speaker.",
    },
];

/// Normalized provider output plus what had to be dropped to get there
#[derive(Debug, Clone)]
pub struct Normalized {
    pub fields: ExtractionFields,
    pub dropped: Vec<String>,
}

/// Fill absent fields, drop out-of-domain values and validate the result.
///
/// An object that carries none of the declared fields is rejected outright;
/// it is an error payload or an unrelated object, not an empty extraction.
///
/// Returns the serde diagnostic as the error when the normalized object
/// still does not deserialize into `ExtractionFields`.
pub fn normalize(value: &Value) -> Result<Normalized, String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("expected a JSON object, got {}", json_type(value)))?;

    if !FIELDS.iter().any(|spec| object.contains_key(spec.name)) {
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        return Err(format!(
            "object has none of the expected fields (got keys: [{}])",
            keys.join(", ")
        ));
    }

    let mut normalized = Map::new();
    let mut dropped = Vec::new();

    for spec in FIELDS {
        let allowed = (spec.allowed)();
        let raw = object.get(spec.name).unwrap_or(&Value::Null);

        let cleaned = match spec.kind {
            FieldKind::Scalar => normalize_scalar(spec.name, raw, &allowed, &mut dropped),
            FieldKind::List => normalize_list(spec.name, raw, &allowed, &mut dropped),
            FieldKind::Volume => normalize_volume(raw, &allowed, &mut dropped),
        };
        normalized.insert(spec.name.to_string(), cleaned);
    }

    let fields: ExtractionFields =
        serde_json::from_value(Value::Object(normalized)).map_err(|e| e.to_string())?;

    Ok(Normalized { fields, dropped })
}

fn canonical(text: &str) -> String {
    text.trim().to_lowercase().replace([' ', '-'], "_")
}

fn normalize_scalar(
    name: &str,
    raw: &Value,
    allowed: &[&'static str],
    dropped: &mut Vec<String>,
) -> Value {
    match raw {
        Value::Null => Value::Null,
        Value::String(s) => {
            let candidate = canonical(s);
            if allowed.contains(&candidate.as_str()) {
                Value::String(candidate)
            } else {
                dropped.push(format!("{}: {:?} is not an allowed value", name, s));
                Value::Null
            }
        }
        other => {
            dropped.push(format!("{}: expected string, got {}", name, json_type(other)));
            Value::Null
        }
    }
}

fn normalize_list(
    name: &str,
    raw: &Value,
    allowed: &[&'static str],
    dropped: &mut Vec<String>,
) -> Value {
    let items = match raw {
        Value::Null => return Value::Array(Vec::new()),
        Value::Array(items) => items,
        other => {
            dropped.push(format!("{}: expected array, got {}", name, json_type(other)));
            return Value::Array(Vec::new());
        }
    };

    let mut kept: Vec<Value> = Vec::new();
    for item in items {
        let Some(text) = item.as_str() else {
            dropped.push(format!("{}: non-string item {}", name, item));
            continue;
        };
        let candidate = canonical(text);
        if !allowed.contains(&candidate.as_str()) {
            dropped.push(format!("{}: {:?} is not an allowed value", name, text));
            continue;
        }
        let candidate = Value::String(candidate);
        if !kept.contains(&candidate) {
            kept.push(candidate);
        }
    }
    Value::Array(kept)
}

fn normalize_volume(raw: &Value, units: &[&'static str], dropped: &mut Vec<String>) -> Value {
    let object = match raw {
        Value::Null => return Value::Null,
        Value::Object(object) => object,
        other => {
            dropped.push(format!("volume: expected object, got {}", json_type(other)));
            return Value::Null;
        }
    };

    let quantity = object
        .get("quantity")
        .and_then(Value::as_u64)
        .filter(|q| *q <= u32::MAX as u64);
    let Some(quantity) = quantity else {
        dropped.push("volume: quantity must be a non-negative integer".to_string());
        return Value::Null;
    };

    let unit = object.get("unit").and_then(Value::as_str).map(canonical);
    let Some(unit) = unit.filter(|u| units.contains(&u.as_str())) else {
        dropped.push("volume: unit is missing or not an allowed value".to_string());
        return Value::Null;
    };

    let is_peak = object
        .get("isPeak")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    serde_json::json!({ "quantity": quantity, "unit": unit, "isPeak": is_peak })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Schema block for the extraction prompt
pub fn describe() -> String {
    let mut lines = Vec::with_capacity(FIELDS.len());
    for spec in FIELDS {
        let values = (spec.allowed)()
            .iter()
            .map(|v| format!("\"{}\"", v))
            .collect::<Vec<_>>()
            .join(", ");
        let shape = match spec.kind {
            FieldKind::Scalar => format!("one of [{}] or null", values),
            FieldKind::List => format!("array of distinct values from [{}]", values),
            FieldKind::Volume => format!("object with unit one of [{}], or null", values),
        };
        lines.push(format!("- \"{}\": {}. {}", spec.name, shape, spec.guidance));
    }
    lines.join("\n")
}
