//! Prompt templates for model-backed extraction and insights
//!
//! Provides the default templates and the helpers that fill their
//! placeholders.

use crate::domain::hints::DeterministicHints;
use crate::domain::schema;

/// Default prompt templates
pub struct PromptTemplates;

impl PromptTemplates {
    /// Template for structured extraction from one sales-meeting transcript
    pub fn extraction() -> &'static str {
        r#"You are an expert sales analyst. Read the following sales-meeting transcript between a seller and a prospect and extract structured facts about the prospect.

Return ONLY a JSON object with exactly these fields:
{schema}

Rules:
- Use only the allowed values listed for each field. Never invent new values.
- Use null (or an empty array) when the transcript does not support a value.
- Do not include explanations, markdown or any text outside the JSON object.
{hints}
Transcript:
{transcript}"#
    }

    /// Template for narrative insights over aggregated extraction data
    pub fn insights() -> &'static str {
        r#"You are a sales operations analyst. Below are aggregated statistics from analyzed sales meetings: stage counts and breakdown tables where each row has a label, the number of meetings and how many of them closed.

Aggregates (JSON):
{aggregates}

Return ONLY a JSON object of the form:
{"summary": "<two or three sentences>", "highlights": ["<finding>", ...], "recommendations": ["<action>", ...]}

Ground every statement in the numbers above. Give 3-5 highlights and 2-4 recommendations."#
    }

    /// Fill the extraction template for one transcript
    pub fn build_extraction(transcript: &str, hints: &DeterministicHints) -> String {
        let hint_lines = hints.prompt_lines();
        let hints_block = if hint_lines.is_empty() {
            String::new()
        } else {
            format!(
                "\nPattern-matched hints (high precision, confirm against the transcript):\n{}\n",
                hint_lines.join("\n")
            )
        };

        Self::extraction()
            .replace("{schema}", &schema::describe())
            .replace("{hints}", &hints_block)
            .replace("{transcript}", transcript)
    }

    /// Fill the insights template with serialized aggregates
    pub fn build_insights(aggregates_json: &str) -> String {
        Self::insights().replace("{aggregates}", aggregates_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_have_placeholders() {
        let prompt = PromptTemplates::extraction();
        assert!(prompt.contains("{schema}"));
        assert!(prompt.contains("{hints}"));
        assert!(prompt.contains("{transcript}"));
        assert!(PromptTemplates::insights().contains("{aggregates}"));
    }

    #[test]
    fn test_build_extraction_embeds_schema_and_transcript() {
        let text = "Hola, somos una tienda online.";
        let prompt = PromptTemplates::build_extraction(text, &DeterministicHints::extract(text));
        assert!(prompt.contains("\"painPoints\""));
        assert!(prompt.contains(text));
        assert!(!prompt.contains("{schema}"));
        assert!(!prompt.contains("Pattern-matched hints"));
    }

    #[test]
    fn test_build_extraction_embeds_non_empty_hints() {
        let text = "Nos recomendaron ustedes y usamos Shopify.";
        let prompt = PromptTemplates::build_extraction(text, &DeterministicHints::extract(text));
        assert!(prompt.contains("Pattern-matched hints"));
        assert!(prompt.contains("\"referral\""));
        assert!(prompt.contains("\"ecommerce_platform\""));
        assert!(!prompt.contains("- volume:"));
    }
}
