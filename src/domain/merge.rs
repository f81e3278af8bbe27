//! Confidence-gated merge of deterministic hints and provider output

use crate::domain::hints::DeterministicHints;
use crate::domain::models::ExtractionFields;

/// Minimum hint confidence for a deterministic value to win
pub const CONFIDENCE_GATE: f32 = 0.7;

/// Merge deterministic hints into a provider's fields.
///
/// `leadSource` and `volume` take the deterministic value only when its
/// confidence clears the gate; below the gate the provider value stands,
/// even when it is null. `integrations` is the union of both sets when the
/// deterministic set is non-empty. Everything else is the provider's.
pub fn merge(hints: &DeterministicHints, provider: ExtractionFields) -> ExtractionFields {
    let mut merged = provider;

    if hints.lead_source.confidence >= CONFIDENCE_GATE {
        merged.lead_source = Some(hints.lead_source.source);
    }

    if hints.volume.confidence >= CONFIDENCE_GATE {
        if let Some(volume) = hints.volume.volume {
            merged.volume = Some(volume);
        }
    }

    if !hints.integrations.integrations.is_empty() {
        let mut union = hints.integrations.integrations.clone();
        for integration in merged.integrations {
            if !union.contains(&integration) {
                union.push(integration);
            }
        }
        merged.integrations = union;
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hints::{
        IntegrationsHint, LeadSourceHint, VolumeHint, FUZZY_CONFIDENCE, PRECISE_CONFIDENCE,
        UNKNOWN_CONFIDENCE, VOLUME_CONFIDENCE, VOLUME_FALLBACK_CONFIDENCE,
    };
    use crate::domain::models::{Industry, Integration, LeadSource, Volume, VolumeUnit};

    fn hints(source: LeadSource, confidence: f32) -> DeterministicHints {
        DeterministicHints {
            lead_source: LeadSourceHint { source, confidence },
            volume: VolumeHint {
                volume: None,
                confidence: 0.0,
            },
            integrations: IntegrationsHint {
                integrations: vec![],
                confidence: 0.0,
            },
        }
    }

    #[test]
    fn test_confident_lead_source_overrides_provider() {
        let provider = ExtractionFields {
            lead_source: Some(LeadSource::Advertising),
            industry: Some(Industry::Retail),
            ..Default::default()
        };
        let merged = merge(&hints(LeadSource::Conference, PRECISE_CONFIDENCE), provider);
        assert_eq!(merged.lead_source, Some(LeadSource::Conference));
        assert_eq!(merged.industry, Some(Industry::Retail));
    }

    #[test]
    fn test_fuzzy_confidence_meets_gate() {
        let merged = merge(
            &hints(LeadSource::WebSearch, FUZZY_CONFIDENCE),
            ExtractionFields::default(),
        );
        assert_eq!(merged.lead_source, Some(LeadSource::WebSearch));
    }

    #[test]
    fn test_low_confidence_unknown_never_replaces_provider() {
        let provider = ExtractionFields {
            lead_source: Some(LeadSource::Podcast),
            ..Default::default()
        };
        let merged = merge(&hints(LeadSource::Unknown, UNKNOWN_CONFIDENCE), provider);
        assert_eq!(merged.lead_source, Some(LeadSource::Podcast));
    }

    #[test]
    fn test_low_confidence_does_not_fill_missing_provider_value() {
        let merged = merge(
            &hints(LeadSource::Unknown, UNKNOWN_CONFIDENCE),
            ExtractionFields::default(),
        );
        assert_eq!(merged.lead_source, None);
    }

    #[test]
    fn test_volume_gate() {
        let provider_volume = Volume {
            quantity: 10,
            unit: VolumeUnit::Daily,
            is_peak: false,
        };
        let hinted = Volume {
            quantity: 150,
            unit: VolumeUnit::Weekly,
            is_peak: false,
        };
        let provider = ExtractionFields {
            volume: Some(provider_volume),
            ..Default::default()
        };

        let mut confident = hints(LeadSource::Unknown, UNKNOWN_CONFIDENCE);
        confident.volume = VolumeHint {
            volume: Some(hinted),
            confidence: VOLUME_CONFIDENCE,
        };
        assert_eq!(merge(&confident, provider.clone()).volume, Some(hinted));

        let mut weak = hints(LeadSource::Unknown, UNKNOWN_CONFIDENCE);
        weak.volume = VolumeHint {
            volume: Some(hinted),
            confidence: VOLUME_FALLBACK_CONFIDENCE,
        };
        assert_eq!(merge(&weak, provider).volume, Some(provider_volume));
    }

    #[test]
    fn test_integrations_union_without_duplicates() {
        let mut h = hints(LeadSource::Unknown, UNKNOWN_CONFIDENCE);
        h.integrations = IntegrationsHint {
            integrations: vec![Integration::Whatsapp, Integration::Crm],
            confidence: 0.9,
        };
        let provider = ExtractionFields {
            integrations: vec![Integration::Crm, Integration::Calendar],
            ..Default::default()
        };
        let merged = merge(&h, provider);
        assert_eq!(
            merged.integrations,
            vec![Integration::Whatsapp, Integration::Crm, Integration::Calendar]
        );
    }

    #[test]
    fn test_empty_hint_integrations_keep_provider_set() {
        let provider = ExtractionFields {
            integrations: vec![Integration::Erp],
            ..Default::default()
        };
        let merged = merge(&hints(LeadSource::Unknown, UNKNOWN_CONFIDENCE), provider);
        assert_eq!(merged.integrations, vec![Integration::Erp]);
    }
}
