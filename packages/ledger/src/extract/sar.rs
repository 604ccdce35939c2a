//! SAR segment extraction: discrete search/rescue/recovery operations
//! with verb-driven outcome tags and dates.

use chrono::NaiveDate;

use crate::extract::dates::all_dates_with_spans;
use crate::types::incident::{SarOpType, SarSegment};

/// Verbs that mark a search being paused.
const PAUSE_VERBS: &[&str] = &["suspended", "called off", "paused", "stood down", "scaled back"];

/// Verbs that mark a search being picked back up.
const RESUME_VERBS: &[&str] = &["resumed", "will resume", "resuming"];

/// Verbs that mark a search starting or running.
const START_VERBS: &[&str] = &["began", "begun", "launched", "started", "underway", "continued"];

/// Forward window from a "search" mention scanned for state verbs and dates.
const SEARCH_WINDOW: usize = 220;

/// Backward reach for a date preceding the "search" mention.
const SEARCH_BACK: usize = 100;

/// Max distance between a rescue verb and its date.
const RESCUE_BIND: usize = 60;

/// Extract SAR segments from one document.
///
/// `recovery` is the already-resolved recovery date (§ temporal pass); a
/// recovery segment is emitted whenever it is present. At most one search
/// and one rescue segment are emitted per document. `agency` is always
/// None here; only a refinement pass may attribute one.
pub fn extract_segments(
    text: &str,
    text_lower: &str,
    reference: Option<NaiveDate>,
    recovery: Option<NaiveDate>,
) -> Vec<SarSegment> {
    let mut segments = Vec::new();

    if let Some(search) = search_segment(text, text_lower, reference) {
        segments.push(search);
    }
    if let Some(rescue) = rescue_segment(text, text_lower, reference) {
        segments.push(rescue);
    }
    if let Some(date) = recovery {
        segments.push(SarSegment::on_date(SarOpType::Recovery, date));
    }

    segments
}

/// A search segment: "search" co-occurring with a state verb inside the
/// forward window, dated by the nearest date in that window.
fn search_segment(
    text: &str,
    text_lower: &str,
    reference: Option<NaiveDate>,
) -> Option<SarSegment> {
    let spans = all_dates_with_spans(text, reference);

    let mut from = 0;
    while let Some(found) = text_lower[from..].find("search") {
        let pos = from + found;
        let mut window_end = (pos + SEARCH_WINDOW).min(text_lower.len());
        while window_end < text_lower.len() && !text_lower.is_char_boundary(window_end) {
            window_end += 1;
        }
        let window = &text_lower[pos..window_end];

        let first_verb_at =
            |verbs: &[&str]| verbs.iter().filter_map(|v| window.find(v)).min();

        let (outcome, verb_offset) = if let Some(at) = first_verb_at(PAUSE_VERBS) {
            (Some("suspended".to_string()), at)
        } else if let Some(at) = first_verb_at(RESUME_VERBS) {
            (Some("resumed".to_string()), at)
        } else if let Some(at) = first_verb_at(START_VERBS) {
            (None, at)
        } else {
            from = pos + "search".len();
            continue; // no state verb near this mention
        };

        // The state verb anchors the operation's date, not the word
        // "search" itself.
        let anchor = pos + verb_offset;
        let date = spans
            .iter()
            .filter(|s| s.start + SEARCH_BACK >= pos && s.start <= window_end)
            .min_by_key(|s| s.start.abs_diff(anchor))
            .map(|s| s.date);

        let mut segment = match date {
            Some(date) => SarSegment::on_date(SarOpType::Search, date),
            None => SarSegment {
                op_type: SarOpType::Search,
                agency: None,
                started_at: None,
                ended_at: None,
                outcome: None,
            },
        };
        segment.outcome = outcome;
        return Some(segment);
    }
    None
}

/// A rescue segment: rescued/airlifted/evacuated tightly bound to a date.
fn rescue_segment(
    text: &str,
    text_lower: &str,
    reference: Option<NaiveDate>,
) -> Option<SarSegment> {
    let spans = all_dates_with_spans(text, reference);
    if spans.is_empty() {
        return None;
    }

    for verb in ["rescued", "airlifted", "evacuated"] {
        if let Some(pos) = text_lower.find(verb) {
            let verb_end = pos + verb.len();
            if let Some(span) = spans.iter().find(|s| {
                s.start.abs_diff(verb_end) <= RESCUE_BIND || s.end.abs_diff(pos) <= RESCUE_BIND
            }) {
                return Some(SarSegment::on_date(SarOpType::Rescue, span.date));
            }
        }
    }
    None
}
