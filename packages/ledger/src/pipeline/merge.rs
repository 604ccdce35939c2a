//! Field reconciliation: fold a refinement payload into the authoritative
//! record without destroying previously known facts.
//!
//! Every rule here is per-field and independent: a refined value wins only
//! when it is non-empty; empty refined values never erase existing data.
//! List fields are replaced wholesale when non-empty, never unioned.

use crate::types::extraction::QuotedEvidence;
use crate::types::incident::{
    midnight_utc, Activity, IncidentPatch, IncidentRecord, Jurisdiction, SarOpType, SarSegment,
};
use crate::types::refinement::{sanitize_place, RefinedSarSegment, RefinementPayload};
use crate::types::source::SourceMetaPatch;

/// What one merge produces: the incident field update set, source
/// annotations, the SAR replacement set (when any), and source-level
/// metadata proposals kept separate from the incident record.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub patch: IncidentPatch,
    pub summary_bullets: Option<Vec<String>>,
    pub quoted_evidence: QuotedEvidence,
    /// `Some` means: replace the record's full segment set with these.
    pub sar: Option<Vec<SarSegment>>,
    pub source_meta: SourceMetaPatch,
}

/// A string counts as present only when it has visible content.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn non_empty_list(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

/// Convert a refined segment, validating op_type against the closed
/// vocabulary. Out-of-vocabulary segments are dropped, not guessed.
fn convert_segment(segment: &RefinedSarSegment) -> Option<SarSegment> {
    let op_type = SarOpType::parse(&segment.op_type)?;
    Some(SarSegment {
        op_type,
        agency: segment
            .agency
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        started_at: segment.started_at.map(midnight_utc),
        ended_at: segment.ended_at.map(midnight_utc),
        outcome: segment.outcome.clone(),
    })
}

/// The fixed evidence keys compacted out of the refined evidence list.
const EVIDENCE_FIELDS: [&str; 4] = [
    "cause_primary",
    "date_of_death",
    "n_fatalities",
    "location_name",
];

/// Merge a refinement payload against the current record.
pub fn merge(current: &IncidentRecord, refined: &RefinementPayload) -> MergeOutcome {
    let mut patch = IncidentPatch::default();

    // Jurisdiction: validated against the closed 3-code set; anything
    // else ("unknown", "CA", prose) never leaks through.
    patch.jurisdiction = refined
        .jurisdiction
        .as_deref()
        .and_then(Jurisdiction::parse);

    patch.location_name = non_empty(&refined.location_name).and_then(sanitize_place);
    patch.peak_name = non_empty(&refined.peak_name).and_then(sanitize_place);
    patch.route_name = non_empty(&refined.route_name).and_then(sanitize_place);

    // Activity: synonym table, then clamp to the closed vocabulary.
    patch.activity = non_empty(&refined.activity).map(Activity::normalize);

    patch.cause_primary = non_empty(&refined.cause_primary).map(str::to_string);
    patch.phase = non_empty(&refined.phase).map(str::to_string);

    patch.n_fatalities = refined.n_fatalities;
    patch.n_injured = refined.n_injured;
    patch.party_size = refined.party_size;

    patch.date_event_start = refined.date_event_start;
    patch.date_event_end = refined.date_event_end;
    patch.date_of_death = refined.date_of_death;

    // List fields: wholesale replacement when non-empty.
    patch.contributing_factors = non_empty_list(&refined.contributing_factors);
    patch.names_all = non_empty_list(&refined.names_all);
    patch.names_deceased = non_empty_list(&refined.names_deceased);
    patch.names_relatives = non_empty_list(&refined.names_relatives);
    patch.names_responders = non_empty_list(&refined.names_responders);
    patch.names_spokespersons = non_empty_list(&refined.names_spokespersons);
    patch.names_medics = non_empty_list(&refined.names_medics);

    // Derived delta when the refined dates allow it.
    let event = patch.date_event_start.or(current.date_event_start);
    let recovery = current.date_recovery;
    if let (Some(event), Some(recovery)) = (event, recovery) {
        let delta = (recovery - event).num_days();
        patch.time_to_recovery_days = u32::try_from(delta).ok();
    }

    let mut quoted_evidence = QuotedEvidence::new();
    for field in EVIDENCE_FIELDS {
        if let Some(quote) = refined.evidence_for(field) {
            quoted_evidence.insert(field.to_string(), quote.to_string());
        }
    }

    let sar: Vec<SarSegment> = refined.sar.iter().filter_map(convert_segment).collect();

    MergeOutcome {
        patch,
        summary_bullets: non_empty_list(&refined.summary_bullets),
        quoted_evidence,
        sar: if sar.is_empty() { None } else { Some(sar) },
        source_meta: SourceMetaPatch {
            publisher: non_empty(&refined.publisher).map(str::to_string),
            article_title: non_empty(&refined.article_title).map(str::to_string),
            date_published: refined.date_published,
        },
    }
}

/// Missing-or-placeholder test used by the augment gate.
fn is_missing_str(value: &Option<String>) -> bool {
    match value.as_deref().map(str::trim) {
        None => true,
        Some(s) => s.is_empty() || matches!(s.to_lowercase().as_str(), "unknown" | "n/a" | "null"),
    }
}

/// Whether an incident still has a missing/placeholder core field and is
/// therefore worth an augmentation call.
pub fn needs_augment(record: &IncidentRecord) -> bool {
    record.jurisdiction.is_none()
        || is_missing_str(&record.location_name)
        || is_missing_str(&record.peak_name)
        || is_missing_str(&record.route_name)
        || record.activity.is_none_or(|a| a == Activity::Unknown)
        || is_missing_str(&record.cause_primary)
        || record.n_fatalities.is_none()
        || record.date_event_start.is_none()
        || record.date_event_end.is_none()
        || record.date_of_death.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn current() -> IncidentRecord {
        let mut record = IncidentRecord::new(Uuid::new_v4());
        record.activity = Some(Activity::Climbing);
        record.cause_primary = Some("avalanche".to_string());
        record.contributing_factors = Some(vec!["steep terrain".to_string()]);
        record
    }

    #[test]
    fn test_null_activity_never_erases() {
        let refined = RefinementPayload::default();
        let outcome = merge(&current(), &refined);
        // no activity key in the update set: existing value preserved
        assert!(outcome.patch.activity.is_none());
        assert!(outcome.patch.cause_primary.is_none());

        let mut record = current();
        outcome.patch.apply(&mut record);
        assert_eq!(record.activity, Some(Activity::Climbing));
        assert_eq!(record.cause_primary.as_deref(), Some("avalanche"));
    }

    #[test]
    fn test_jurisdiction_coerced_to_closed_set() {
        let refined = RefinementPayload {
            jurisdiction: Some("Unknown".to_string()),
            ..Default::default()
        };
        assert!(merge(&current(), &refined).patch.jurisdiction.is_none());

        let refined = RefinementPayload {
            jurisdiction: Some("CA".to_string()),
            ..Default::default()
        };
        assert!(merge(&current(), &refined).patch.jurisdiction.is_none());

        let refined = RefinementPayload {
            jurisdiction: Some("bc".to_string()),
            ..Default::default()
        };
        assert_eq!(
            merge(&current(), &refined).patch.jurisdiction,
            Some(Jurisdiction::BC)
        );
    }

    #[test]
    fn test_activity_synonym_clamp() {
        let refined = RefinementPayload {
            activity: Some("heli-skiing".to_string()),
            ..Default::default()
        };
        assert_eq!(
            merge(&current(), &refined).patch.activity,
            Some(Activity::SkiMountaineering)
        );

        let refined = RefinementPayload {
            activity: Some("paragliding".to_string()),
            ..Default::default()
        };
        assert_eq!(
            merge(&current(), &refined).patch.activity,
            Some(Activity::Unknown)
        );
    }

    #[test]
    fn test_lists_replaced_wholesale_not_unioned() {
        let refined = RefinementPayload {
            contributing_factors: vec!["cornice failure".to_string()],
            ..Default::default()
        };
        let outcome = merge(&current(), &refined);
        let mut record = current();
        outcome.patch.apply(&mut record);
        assert_eq!(
            record.contributing_factors,
            Some(vec!["cornice failure".to_string()])
        );
    }

    #[test]
    fn test_empty_list_leaves_existing() {
        let refined = RefinementPayload::default();
        let outcome = merge(&current(), &refined);
        let mut record = current();
        outcome.patch.apply(&mut record);
        assert_eq!(
            record.contributing_factors,
            Some(vec!["steep terrain".to_string()])
        );
    }

    #[test]
    fn test_sar_conversion_validates_op_type() {
        let refined = RefinementPayload {
            sar: vec![
                RefinedSarSegment {
                    op_type: "recovery".to_string(),
                    agency: Some("Squamish SAR".to_string()),
                    started_at: NaiveDate::from_ymd_opt(2021, 7, 18),
                    ..Default::default()
                },
                RefinedSarSegment {
                    op_type: "patrol".to_string(), // out of vocabulary
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let outcome = merge(&current(), &refined);
        let sar = outcome.sar.unwrap();
        assert_eq!(sar.len(), 1);
        assert_eq!(sar[0].op_type, SarOpType::Recovery);
        assert_eq!(sar[0].agency.as_deref(), Some("Squamish SAR"));
    }

    #[test]
    fn test_all_invalid_sar_means_no_replacement() {
        let refined = RefinementPayload {
            sar: vec![RefinedSarSegment {
                op_type: "patrol".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(merge(&current(), &refined).sar.is_none());
    }

    #[test]
    fn test_evidence_compacted_to_fixed_keys() {
        let refined = RefinementPayload {
            evidence: vec![
                crate::types::refinement::Evidence {
                    field: "cause_primary".to_string(),
                    quote: "swept by an avalanche".to_string(),
                    source_offset: None,
                },
                crate::types::refinement::Evidence {
                    field: "weather".to_string(), // not a tracked key
                    quote: "clear skies".to_string(),
                    source_offset: None,
                },
            ],
            ..Default::default()
        };
        let outcome = merge(&current(), &refined);
        assert_eq!(
            outcome.quoted_evidence.get("cause_primary").map(String::as_str),
            Some("swept by an avalanche")
        );
        assert!(!outcome.quoted_evidence.contains_key("weather"));
    }

    #[test]
    fn test_source_meta_kept_separate_from_patch() {
        let refined = RefinementPayload {
            publisher: Some("Example Times".to_string()),
            article_title: Some("Climbers lost".to_string()),
            location_name: Some("Atwell Peak, near Squamish".to_string()),
            ..Default::default()
        };
        let outcome = merge(&current(), &refined);
        assert_eq!(outcome.source_meta.publisher.as_deref(), Some("Example Times"));
        // sanitizer strips the ", near ..." qualifier on the record side
        assert_eq!(outcome.patch.location_name.as_deref(), Some("Atwell Peak"));
    }

    #[test]
    fn test_needs_augment_on_placeholder_fields() {
        let mut record = IncidentRecord::new(Uuid::new_v4());
        assert!(needs_augment(&record));

        record.jurisdiction = Some(Jurisdiction::BC);
        record.location_name = Some("Atwell Peak".to_string());
        record.peak_name = Some("Atwell Peak".to_string());
        record.route_name = Some("North Face".to_string());
        record.activity = Some(Activity::Alpinism);
        record.cause_primary = Some("avalanche".to_string());
        record.n_fatalities = Some(3);
        let date = NaiveDate::from_ymd_opt(2021, 7, 8);
        record.date_event_start = date;
        record.date_event_end = date;
        record.date_of_death = date;
        assert!(!needs_augment(&record));

        record.cause_primary = Some("unknown".to_string());
        assert!(needs_augment(&record));
    }
}
