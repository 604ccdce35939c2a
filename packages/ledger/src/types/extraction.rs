//! Output of the deterministic extraction pass.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::types::incident::{Activity, IncidentPatch, Jurisdiction, SarSegment};

/// Per-field provenance quotes, persisted on the source document.
///
/// Keys are field names (e.g. `cause_primary`, `date_of_death`); values
/// are the supporting sentence or quote.
pub type QuotedEvidence = BTreeMap<String, String>;

/// Result of one deterministic extraction over a document.
///
/// Ephemeral: produced per document and folded into the incident record
/// and source annotations by the pipeline. Unparseable sub-expressions
/// degrade to `None` fields, never to failures.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub jurisdiction: Option<Jurisdiction>,
    pub iso_country: Option<String>,
    pub admin_area: Option<String>,
    pub tz_local: Option<String>,
    pub location_name: Option<String>,
    pub peak_name: Option<String>,
    pub event_type: Option<String>,
    pub activity: Option<Activity>,
    pub cause_primary: Option<String>,
    pub contributing_factors: Vec<String>,
    pub phase: Option<String>,
    pub n_fatalities: Option<u32>,
    pub date_event_start: Option<NaiveDate>,
    pub date_event_end: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
    pub date_recovery: Option<NaiveDate>,
    pub time_to_recovery_days: Option<u32>,
    pub agencies_found: Vec<String>,
    pub multi_agency: bool,
    pub summary_bullets: Vec<String>,
    pub sar: Vec<SarSegment>,
    pub quoted_evidence: QuotedEvidence,
}

impl ExtractionResult {
    /// The all-null result malformed input degrades to.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Convert the extracted fields into an incident patch.
    ///
    /// Empty lists are not included, so a pass that found nothing cannot
    /// clear previously known values.
    pub fn to_patch(&self) -> IncidentPatch {
        IncidentPatch {
            jurisdiction: self.jurisdiction,
            location_name: self.location_name.clone(),
            peak_name: self.peak_name.clone(),
            event_type: self.event_type.clone(),
            activity: self.activity,
            cause_primary: self.cause_primary.clone(),
            contributing_factors: if self.contributing_factors.is_empty() {
                None
            } else {
                Some(self.contributing_factors.clone())
            },
            n_fatalities: self.n_fatalities,
            date_event_start: self.date_event_start,
            date_event_end: self.date_event_end,
            date_of_death: self.date_of_death,
            date_recovery: self.date_recovery,
            time_to_recovery_days: self.time_to_recovery_days,
            iso_country: self.iso_country.clone(),
            admin_area: self.admin_area.clone(),
            tz_local: self.tz_local.clone(),
            phase: self.phase.clone(),
            ..Default::default()
        }
    }
}
