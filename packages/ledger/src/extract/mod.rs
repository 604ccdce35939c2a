//! Deterministic extraction: compose the heuristic passes into one
//! `ExtractionResult`.
//!
//! `extract` is a pure function of its inputs: no I/O, no mutation, no
//! wall-clock reads. It never fails — unparseable sub-expressions degrade
//! to None fields.

pub mod casualties;
pub mod dates;
pub mod evidence;
pub mod places;
pub mod sar;
pub mod taxonomy;

use chrono::NaiveDate;

use crate::types::config::ExtractorConfig;
use crate::types::extraction::ExtractionResult;

/// Event-type label for confirmed-fatality incidents.
pub const EVENT_TYPE_FATALITY: &str = "fatality";

/// Responder categories detected in the text, for the multi-agency flag.
fn agencies_found(text_lower: &str, config: &ExtractorConfig) -> Vec<String> {
    config
        .agency_groups
        .iter()
        .filter(|group| {
            group
                .keywords
                .iter()
                .any(|kw| text_lower.contains(kw.as_str()))
        })
        .map(|group| group.name.clone())
        .collect()
}

/// Run the full deterministic pass over one document.
pub fn extract(
    text: &str,
    published: Option<NaiveDate>,
    config: &ExtractorConfig,
) -> ExtractionResult {
    if text.trim().is_empty() {
        return ExtractionResult::empty();
    }
    let text_lower = text.to_lowercase();

    let n_fatalities = casualties::fatality_count(&text_lower);
    let activity = taxonomy::classify_activity(&text_lower);
    let cause_primary = taxonomy::classify_cause(&text_lower).map(str::to_string);
    let phase = taxonomy::classify_phase(&text_lower).map(str::to_string);
    let contributing_factors = taxonomy::contributing_factors(&text_lower);

    let spatial = places::classify(text, &text_lower, config);

    let event_date = dates::event_date(text, config, published);
    let recovery_date = dates::recovery_date(text, config, published);
    let time_to_recovery_days = dates::days_to_recovery(event_date, recovery_date);

    let agencies = agencies_found(&text_lower, config);
    let multi_agency = agencies.len() >= 2;

    let has_fatalities = n_fatalities.is_some_and(|n| n > 0);
    let bodies_recovered = text_lower.contains("bodies") && text_lower.contains("recovered");
    let event_type = (has_fatalities || bodies_recovered).then(|| EVENT_TYPE_FATALITY.to_string());

    let sar = sar::extract_segments(text, &text_lower, published, recovery_date);
    let quoted_evidence = evidence::locate(text);

    let mut summary_bullets = Vec::new();
    if let Some(n) = n_fatalities {
        summary_bullets.push(format!("Fatalities: {}", n));
    }
    if let Some(cause) = &cause_primary {
        summary_bullets.push(format!("Cause: {}", cause));
    }
    if let Some(activity) = &activity {
        summary_bullets.push(format!("Activity: {}", activity.as_str()));
    }
    if let Some(published) = published {
        summary_bullets.push(format!("Published: {}", published));
    }
    if let Some(event) = event_date {
        summary_bullets.push(format!("Event date: {}", event));
    }
    if let Some(recovery) = recovery_date {
        summary_bullets.push(format!("Recovery date: {}", recovery));
    }

    ExtractionResult {
        jurisdiction: spatial.jurisdiction,
        iso_country: spatial.jurisdiction.map(|j| j.iso_country().to_string()),
        admin_area: spatial.jurisdiction.map(|j| j.admin_area().to_string()),
        tz_local: spatial.jurisdiction.map(|j| j.timezone().to_string()),
        location_name: spatial.location_name,
        peak_name: spatial.peak_name,
        event_type,
        activity,
        cause_primary,
        contributing_factors,
        phase,
        n_fatalities,
        date_event_start: event_date,
        date_event_end: event_date,
        date_of_death: event_date,
        date_recovery: recovery_date,
        time_to_recovery_days,
        agencies_found: agencies,
        multi_agency,
        summary_bullets,
        sar,
        quoted_evidence,
    }
}
