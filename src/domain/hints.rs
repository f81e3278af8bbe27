//! Deterministic hint extraction
//!
//! Pure pattern matchers that produce cheap, high-precision guesses for a
//! few fields before any model is called. Same input, same output; no I/O.
//!
//! Every matcher runs against the raw transcript and against a normalized
//! copy (accents stripped, lowercased, whitespace collapsed), so patterns
//! tolerate both "conferencia de tecnología" and "CONFERENCIA  de tecnologia".

use crate::domain::models::{Integration, LeadSource, Volume, VolumeUnit};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const PRECISE_CONFIDENCE: f32 = 0.9;
pub const FUZZY_CONFIDENCE: f32 = 0.7;
pub const UNKNOWN_CONFIDENCE: f32 = 0.5;
pub const VOLUME_CONFIDENCE: f32 = 0.85;
pub const VOLUME_FALLBACK_CONFIDENCE: f32 = 0.6;
pub const INTEGRATIONS_CONFIDENCE: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeadSourceHint {
    pub source: LeadSource,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeHint {
    pub volume: Option<Volume>,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationsHint {
    pub integrations: Vec<Integration>,
    pub confidence: f32,
}

/// All deterministic guesses for one transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeterministicHints {
    pub lead_source: LeadSourceHint,
    pub volume: VolumeHint,
    pub integrations: IntegrationsHint,
}

impl DeterministicHints {
    pub fn extract(text: &str) -> Self {
        Self {
            lead_source: detect_lead_source(text),
            volume: detect_volume(text),
            integrations: detect_integrations(text),
        }
    }

    /// Hint lines worth showing a model; empty hints are left out
    pub fn prompt_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.lead_source.source != LeadSource::Unknown {
            lines.push(format!(
                "- leadSource: \"{}\" (confidence {:.2})",
                self.lead_source.source, self.lead_source.confidence
            ));
        }
        if let Some(volume) = self.volume.volume {
            lines.push(format!(
                "- volume: {{\"quantity\": {}, \"unit\": \"{}\", \"isPeak\": {}}} (confidence {:.2})",
                volume.quantity, volume.unit, volume.is_peak, self.volume.confidence
            ));
        }
        if !self.integrations.integrations.is_empty() {
            let names = self
                .integrations
                .integrations
                .iter()
                .map(|i| format!("\"{}\"", i))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!(
                "- integrations: [{}] (confidence {:.2})",
                names, self.integrations.confidence
            ));
        }
        lines
    }
}

/// Lowercase, strip Spanish/Portuguese accents and collapse whitespace
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
}

// ═══════════════════════════════════════════
// Lead source
// ═══════════════════════════════════════════

struct SourcePatterns {
    source: LeadSource,
    precise: Vec<Regex>,
    fuzzy: &'static [&'static str],
}

/// Categories in priority order; the first with any precise match wins.
static LEAD_SOURCE_PATTERNS: LazyLock<Vec<SourcePatterns>> = LazyLock::new(|| {
    vec![
        SourcePatterns {
            source: LeadSource::Conference,
            precise: compile(&[
                r"\b(?:en|durante|desde)\s+(?:una|la|el|un)\s+(?:conferencia|congreso|charla|summit|cumbre)\b",
                r"\b(?:conferencia|congreso)\s+(?:de|sobre|del)\s+\w+",
                r"\bconference\b",
            ]),
            fuzzy: &["una conferencia", "un congreso", "la charla de", "un evento de tecnologia"],
        },
        SourcePatterns {
            source: LeadSource::TradeFair,
            precise: compile(&[
                r"\b(?:feria|expo|exposici[oó]n)\s+(?:de|del|comercial|empresarial|tecnol[oó]gica)\b",
                r"\bstand\s+de\s+\w+",
            ]),
            fuzzy: &["una feria", "la feria", "en la expo"],
        },
        SourcePatterns {
            source: LeadSource::Webinar,
            precise: compile(&[
                r"\b(?:en|durante|desde)\s+(?:un|el|su|uno\s+de\s+sus)\s+(?:webinars?|seminarios?\s+(?:web|online|virtual))\b",
                r"\b(?:asistimos|participamos|vimos|me\s+inscrib[ií]|nos\s+inscribimos)\s+(?:a|en)\s+(?:un|el|su)\s+webinar\b",
            ]),
            fuzzy: &["charla online", "sesion virtual", "taller online"],
        },
        SourcePatterns {
            source: LeadSource::Podcast,
            precise: compile(&[
                r"\b(?:escuchamos|escuch[eé]|en)\s+(?:un|el|su)\s+podcast\b",
                r"\bpodcast\s+(?:donde|en\s+el\s+que)\s+(?:hablaban|hablaron|mencionaron)\b",
            ]),
            fuzzy: &["programa de radio", "en la radio"],
        },
        SourcePatterns {
            source: LeadSource::Referral,
            precise: compile(&[
                r"\b(?:me|nos)\s+(?:lo\s+|la\s+|los\s+)?recomend(?:[oó]|aron)\b",
                r"\brecomendaci[oó]n\s+de\b",
                r"\breferid[oa]s?\b",
            ]),
            fuzzy: &["un amigo nos", "un colega nos", "un conocido nos", "otra empresa que los usa"],
        },
        SourcePatterns {
            source: LeadSource::SocialMedia,
            precise: compile(&[
                r"\b(?:en|por|de)\s+(?:linkedin|instagram|facebook|tiktok|twitter)\b",
                r"\bredes\s+sociales\b",
            ]),
            fuzzy: &["una publicacion de ustedes", "un post de ustedes", "un video de ustedes"],
        },
        SourcePatterns {
            source: LeadSource::WebSearch,
            precise: compile(&[
                r"\b(?:buscando|busqu[eé]|b[uú]squeda)\s+en\s+(?:google|internet)\b",
                r"\bencontr(?:amos|[eé])\s+(?:\w+\s+){0,3}en\s+(?:google|internet|la\s+web)\b",
            ]),
            fuzzy: &["buscando en la web", "buscando soluciones", "googleando"],
        },
        SourcePatterns {
            source: LeadSource::Advertising,
            precise: compile(&[
                r"\b(?:vimos|vi|por|en)\s+(?:un|su|el)\s+anuncio\b",
                r"\b(?:vimos|vi|por)\s+(?:su|la)\s+publicidad\b",
            ]),
            fuzzy: &["vimos un aviso", "un aviso de ustedes"],
        },
        SourcePatterns {
            source: LeadSource::Article,
            precise: compile(&[
                r"\b(?:le[ií]mos|le[ií]|en)\s+(?:un|su|el)\s+art[ií]culo\b",
                r"\bnota\s+de\s+prensa\b",
                r"\ben\s+(?:un|su)\s+blog\b",
            ]),
            fuzzy: &["lei sobre ustedes", "leimos sobre ustedes"],
        },
    ]
});

/// Detect how the prospect heard about the product
pub fn detect_lead_source(text: &str) -> LeadSourceHint {
    let normalized = normalize_text(text);

    for category in LEAD_SOURCE_PATTERNS.iter() {
        let hit = category
            .precise
            .iter()
            .any(|re| re.is_match(text) || re.is_match(&normalized));
        if hit {
            return LeadSourceHint {
                source: category.source,
                confidence: PRECISE_CONFIDENCE,
            };
        }
    }

    for category in LEAD_SOURCE_PATTERNS.iter() {
        if category.fuzzy.iter().any(|phrase| normalized.contains(phrase)) {
            return LeadSourceHint {
                source: category.source,
                confidence: FUZZY_CONFIDENCE,
            };
        }
    }

    LeadSourceHint {
        source: LeadSource::Unknown,
        confidence: UNKNOWN_CONFIDENCE,
    }
}

// ═══════════════════════════════════════════
// Volume
// ═══════════════════════════════════════════

const NUMBER: &str = r"(?P<n>\d{1,3}(?:[.,]\d{3})+|\d+)(?P<k>\s*mil)?";
const COUNT_NOUN: &str = r"(?:interacciones|consultas|mensajes|conversaciones|llamadas|clientes|solicitudes|tickets|pedidos|chats|correos|contactos|atenciones|reservas)";
const PEAK_PREFIX: &str = r"(?:en|durante)\s+(?:la\s+|el\s+)?(?:temporada\s+alta|temporada|peak|pico|[eé]poca\s+alta|high\s+season)";
const MORE_THAN: &str = r"(?:m[aá]s\s+de|sobre|arriba\s+de|over)";
const CLOSE_TO: &str = r"(?:cerca\s+de|alrededor\s+de|aproximadamente|casi|unas?|unos)";

struct VolumePattern {
    regex: Regex,
    unit: VolumeUnit,
    is_peak: bool,
}

fn frequency(unit: VolumeUnit) -> &'static str {
    match unit {
        VolumeUnit::Daily => r"(?:diari[oa]s|diariamente|(?:al|por|cada)\s+d[ií]a)",
        VolumeUnit::Weekly => r"(?:semanales|semanalmente|(?:a\s+la|por|cada)\s+semana)",
        VolumeUnit::Monthly => r"(?:mensuales|mensualmente|(?:al|por|cada)\s+mes)",
        VolumeUnit::Yearly => r"(?:anuales|anualmente|(?:al|por|cada)\s+a[nñ]o)",
    }
}

/// Compound patterns in priority order: peak, "more than", "close to", plain.
static VOLUME_PATTERNS: LazyLock<Vec<VolumePattern>> = LazyLock::new(|| {
    let tail = |unit: VolumeUnit| {
        format!(
            r"{}\s+{}(?:\s+[\w,]+){{0,4}}?\s+{}",
            NUMBER,
            COUNT_NOUN,
            frequency(unit)
        )
    };

    let mut patterns = Vec::new();
    let variants: [(String, bool); 4] = [
        (format!(r"\b{}[^.]{{0,40}}?", PEAK_PREFIX), true),
        (format!(r"\b{}\s+", MORE_THAN), false),
        (format!(r"\b{}\s+", CLOSE_TO), false),
        (r"\b".to_string(), false),
    ];
    for (prefix, is_peak) in variants.iter() {
        for unit in VolumeUnit::ALL {
            patterns.push(VolumePattern {
                regex: Regex::new(&format!("(?i){}{}", prefix, tail(*unit))).unwrap(),
                unit: *unit,
                is_peak: *is_peak,
            });
        }
    }
    patterns
});

static VOLUME_FALLBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{}\s+{}", NUMBER, COUNT_NOUN)).unwrap());

static PEAK_INDICATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:temporada\s+alta|[eé]poca\s+alta|peak|high\s+season|black\s+friday|cyber\s*day|cyber\s+monday|fiestas\s+patrias|navidad)\b",
    )
    .unwrap()
});

fn parse_quantity(caps: &regex::Captures<'_>) -> Option<u32> {
    let digits: String = caps
        .name("n")?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let base: u32 = digits.parse().ok()?;
    if caps.name("k").is_some() {
        base.checked_mul(1000)
    } else {
        Some(base)
    }
}

/// Detect interaction volume (quantity, unit, peak flag)
pub fn detect_volume(text: &str) -> VolumeHint {
    let normalized = normalize_text(text);
    let peak_mentioned = PEAK_INDICATORS.is_match(text) || PEAK_INDICATORS.is_match(&normalized);

    for pattern in VOLUME_PATTERNS.iter() {
        let caps = pattern
            .regex
            .captures(text)
            .or_else(|| pattern.regex.captures(&normalized));
        if let Some(quantity) = caps.as_ref().and_then(parse_quantity) {
            return VolumeHint {
                volume: Some(Volume {
                    quantity,
                    unit: pattern.unit,
                    is_peak: pattern.is_peak || peak_mentioned,
                }),
                confidence: VOLUME_CONFIDENCE,
            };
        }
    }

    let caps = VOLUME_FALLBACK
        .captures(text)
        .or_else(|| VOLUME_FALLBACK.captures(&normalized));
    if let Some(quantity) = caps.as_ref().and_then(parse_quantity) {
        return VolumeHint {
            volume: Some(Volume {
                quantity,
                unit: VolumeUnit::Weekly,
                is_peak: peak_mentioned,
            }),
            confidence: VOLUME_FALLBACK_CONFIDENCE,
        };
    }

    VolumeHint {
        volume: None,
        confidence: 0.0,
    }
}

// ═══════════════════════════════════════════
// Integrations
// ═══════════════════════════════════════════

static INTEGRATION_PATTERNS: LazyLock<Vec<(Integration, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            Integration::Crm,
            compile(&[r"\b(?:crm|salesforce|hubspot|pipedrive|zoho)\b"]),
        ),
        (
            Integration::Erp,
            compile(&[r"\b(?:erp|sap|netsuite|odoo|defontana|softland)\b"]),
        ),
        (
            Integration::EcommercePlatform,
            compile(&[
                r"\b(?:shopify|woocommerce|vtex|magento|prestashop|jumpseller)\b",
                r"\btienda\s*nube\b",
            ]),
        ),
        (
            Integration::Calendar,
            compile(&[r"\b(?:google\s+calendar|calendly|calendario|agenda\s+(?:online|digital))\b"]),
        ),
        (
            Integration::Helpdesk,
            compile(&[r"\b(?:zendesk|freshdesk|intercom|help\s*desk|mesa\s+de\s+ayuda)\b"]),
        ),
        (Integration::Whatsapp, compile(&[r"\bwhats\s?app\b"])),
        (
            Integration::Email,
            compile(&[r"\b(?:gmail|outlook|mailchimp|e-?mail|correo\s+electr[oó]nico)\b"]),
        ),
        (
            Integration::Payments,
            compile(&[
                r"\b(?:mercado\s*pago|stripe|paypal|webpay|transbank)\b",
                r"\bpasarela\s+de\s+pagos?\b",
            ]),
        ),
        (
            Integration::Spreadsheets,
            compile(&[r"\b(?:excel|google\s+sheets|planillas?|hojas?\s+de\s+c[aá]lculo)\b"]),
        ),
        (
            Integration::CustomApi,
            compile(&[r"\b(?:api|webhooks?|sistema\s+propio|desarrollo\s+propio)\b"]),
        ),
    ]
});

/// Detect systems the prospect mentions needing connected
pub fn detect_integrations(text: &str) -> IntegrationsHint {
    let normalized = normalize_text(text);
    let mut found = Vec::new();

    for (integration, patterns) in INTEGRATION_PATTERNS.iter() {
        let hit = patterns
            .iter()
            .any(|re| re.is_match(text) || re.is_match(&normalized));
        if hit && !found.contains(integration) {
            found.push(*integration);
        }
    }

    let confidence = if found.is_empty() {
        0.0
    } else {
        INTEGRATIONS_CONFIDENCE
    };
    IntegrationsHint {
        integrations: found,
        confidence,
    }
}
