//! Locate and repair the JSON object inside a free-form model reply

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonExtractError {
    /// No `{...}` object anywhere in the text
    NotFound,
    /// Found a candidate but neither it nor its repaired form parses
    Unparseable { candidate: String, message: String },
}

impl std::fmt::Display for JsonExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonExtractError::NotFound => write!(f, "no JSON object found in response"),
            JsonExtractError::Unparseable { message, .. } => {
                write!(f, "JSON could not be repaired: {}", message)
            }
        }
    }
}

/// First `{...}` substring, matched by brace depth outside string literals.
///
/// When the braces never balance, everything up to the last `}` is taken.
pub fn locate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// One repair pass: trim to the outer brackets, drop trailing commas and
/// turn single quotes into double quotes.
pub fn repair(candidate: &str) -> String {
    let start = candidate.find(['{', '[']).unwrap_or(0);
    let end = candidate
        .rfind(['}', ']'])
        .map(|i| i + 1)
        .unwrap_or(candidate.len());
    let trimmed = if start < end {
        &candidate[start..end]
    } else {
        candidate
    };

    TRAILING_COMMA
        .replace_all(trimmed, "$1")
        .replace('\'', "\"")
}

/// Locate, strictly parse, and on failure repair-and-reparse once
pub fn parse_object(text: &str) -> Result<Value, JsonExtractError> {
    let candidate = locate_object(text).ok_or(JsonExtractError::NotFound)?;

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            let repaired = repair(candidate);
            serde_json::from_str::<Value>(&repaired).map_err(|e| {
                log::debug!("Strict parse failed ({}), repair failed ({})", strict_err, e);
                JsonExtractError::Unparseable {
                    candidate: candidate.to_string(),
                    message: e.to_string(),
                }
            })
        }
    }
}
