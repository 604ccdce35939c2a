//! Structured output of the LLM refinement pass.
//!
//! The refiner's raw output may be malformed: null where a list is
//! expected, a bare string where an array is expected, a single object
//! where a list is expected, dates with trailing time components. The
//! payload absorbs all of that at the serde layer so the merger only ever
//! sees a structurally valid value; out-of-vocabulary field *values* are
//! normalized later by the merger itself.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// One provenance quote tagged with the field it supports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Evidence {
    pub field: String,
    pub quote: String,
    pub source_offset: Option<i64>,
}

/// A SAR segment as proposed by the refiner.
///
/// `op_type` stays free text here; the merger validates it against the
/// closed vocabulary and drops segments that fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinedSarSegment {
    pub agency: Option<String>,
    pub op_type: String,
    #[serde(deserialize_with = "lenient::date")]
    pub started_at: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::date")]
    pub ended_at: Option<NaiveDate>,
    pub outcome: Option<String>,
}

/// The refinement payload: a superset of the deterministic extraction's
/// fields plus source-level metadata proposals and a scalar confidence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementPayload {
    pub jurisdiction: Option<String>,
    pub location_name: Option<String>,
    pub peak_name: Option<String>,
    pub route_name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub activity: Option<String>,
    pub cause_primary: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub contributing_factors: Vec<String>,
    #[serde(deserialize_with = "lenient::count")]
    pub n_fatalities: Option<u32>,
    #[serde(deserialize_with = "lenient::count")]
    pub n_injured: Option<u32>,
    #[serde(deserialize_with = "lenient::count")]
    pub party_size: Option<u32>,
    #[serde(deserialize_with = "lenient::date")]
    pub date_event_start: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::date")]
    pub date_event_end: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::date")]
    pub date_of_death: Option<NaiveDate>,
    pub phase: Option<String>,
    #[serde(deserialize_with = "lenient::sar_list")]
    pub sar: Vec<RefinedSarSegment>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub summary_bullets: Vec<String>,
    #[serde(deserialize_with = "lenient::evidence_list")]
    pub evidence: Vec<Evidence>,
    #[serde(deserialize_with = "lenient::confidence")]
    pub extraction_conf: f32,
    #[serde(deserialize_with = "lenient::string_list")]
    pub names_all: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub names_deceased: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub names_relatives: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub names_responders: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub names_spokespersons: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub names_medics: Vec<String>,
    // Source-level overrides
    pub publisher: Option<String>,
    pub article_title: Option<String>,
    #[serde(deserialize_with = "lenient::date")]
    pub date_published: Option<NaiveDate>,
}

impl RefinementPayload {
    /// Parse refiner output, tolerating markdown code fences around the
    /// JSON body. Returns None when no JSON object can be recovered.
    pub fn from_llm_text(text: &str) -> Option<Self> {
        let trimmed = text
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        serde_json::from_str(trimmed).ok()
    }

    /// Confidence clamped into [0, 1].
    pub fn confidence(&self) -> f32 {
        self.extraction_conf.clamp(0.0, 1.0)
    }

    /// First evidence quote tagged with the given field name.
    pub fn evidence_for(&self, field: &str) -> Option<&str> {
        self.evidence
            .iter()
            .find(|e| e.field == field && !e.quote.trim().is_empty())
            .map(|e| e.quote.as_str())
    }
}

static NEAR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is),\s*near\b.*$").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Sanitize a refined place name: strip a trailing ", near ..." qualifier,
/// collapse whitespace, trim punctuation. Empty results become None.
pub fn sanitize_place(value: &str) -> Option<String> {
    let stripped = NEAR_SUFFIX.replace(value, "");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    let trimmed = collapsed.trim().trim_matches(|c| " ,;-".contains(c)).to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Lenient deserializers that coerce common refiner schema violations
/// instead of failing the whole payload.
mod lenient {
    use super::{Evidence, RefinedSarSegment};
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Parse a date from a string that may carry a time suffix.
    fn date_from_str(s: &str) -> Option<NaiveDate> {
        let head = s.trim();
        let head = head.get(..10).unwrap_or(head);
        NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
    }

    pub fn date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(value.as_str().and_then(date_from_str))
    }

    pub fn confidence<'de, D: Deserializer<'de>>(d: D) -> Result<f32, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Number(n) => n.as_f64().unwrap_or(0.0) as f32,
            Value::String(s) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        })
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        })
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::String(s) => {
                let s = s.trim().to_string();
                if s.is_empty() {
                    vec![]
                } else {
                    vec![s]
                }
            }
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            _ => vec![],
        })
    }

    pub fn sar_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<RefinedSarSegment>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Object(_) => serde_json::from_value(value).into_iter().collect(),
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => vec![],
        })
    }

    pub fn evidence_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Evidence>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Object(_) => serde_json::from_value(value).into_iter().collect(),
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => vec![],
        })
    }
}
