//! Temporal extraction: find calendar dates in raw text and pick the best
//! candidates for the event and recovery dates.
//!
//! Recognizes two forms: strict ISO (`2021-07-08`) and long-form
//! (`July 8[, 2021]`). Long-form dates missing a year are resolved against
//! the document's publication year, then against the first explicit year
//! mentioned in the text, else discarded — never against the wall clock,
//! so extraction stays a pure function of its inputs.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::types::config::ExtractorConfig;

const MONTHS: &str = "January|February|March|April|May|June|July|August|September|October|November|December";

static RE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2})-(\d{2})-(\d{2})\b").expect("valid regex"));

static RE_LONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\s+(\d{{1,2}})(?:,\s*(20\d{{2}}))?\b"
    ))
    .expect("valid regex")
});

static RE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").expect("valid regex"));

/// A resolved date with the character span it was found at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatedSpan {
    pub date: NaiveDate,
    pub start: usize,
    pub end: usize,
}

fn month_number(name: &str) -> Option<u32> {
    let n = match name.to_ascii_lowercase().as_str() {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => return None,
    };
    Some(n)
}

/// Year used for long-form dates that omit one: the reference
/// (publication) year when known, else the first explicit year in the
/// text, else nothing.
fn backfill_year(text: &str, reference: Option<NaiveDate>) -> Option<i32> {
    use chrono::Datelike;
    if let Some(reference) = reference {
        return Some(reference.year());
    }
    RE_YEAR
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// All dates mentioned in the text with their spans, in document order.
pub fn all_dates_with_spans(text: &str, reference: Option<NaiveDate>) -> Vec<DatedSpan> {
    let mut spans = Vec::new();
    for caps in RE_ISO.captures_iter(text) {
        let whole = caps.get(0).expect("group 0");
        let parsed = (
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        );
        if let (Ok(y), Ok(m), Ok(d)) = parsed {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                spans.push(DatedSpan {
                    date,
                    start: whole.start(),
                    end: whole.end(),
                });
            }
        }
    }

    let fallback = backfill_year(text, reference);
    for caps in RE_LONG.captures_iter(text) {
        let whole = caps.get(0).expect("group 0");
        let month = match month_number(&caps[1]) {
            Some(m) => m,
            None => continue,
        };
        let day: u32 = match caps[2].parse() {
            Ok(d) => d,
            Err(_) => continue,
        };
        let year: i32 = match caps.get(3).map(|m| m.as_str().parse()) {
            Some(Ok(y)) => y,
            Some(Err(_)) => continue,
            None => match fallback {
                Some(y) => y,
                None => continue, // no year anywhere: discard the candidate
            },
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            spans.push(DatedSpan {
                date,
                start: whole.start(),
                end: whole.end(),
            });
        }
    }

    spans.sort_by_key(|s| s.start);
    spans
}

/// Slice a window around a byte offset, clamped to char boundaries.
fn window_around(text: &str, center: usize, half: usize) -> &str {
    let mut start = center.saturating_sub(half);
    let mut end = (center + half).min(text.len());
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}

/// Pick a date associated with the given keywords by windowed scoring.
///
/// Scores every candidate within its context window; ties break to the
/// chronologically earliest date. Returns None when no candidate scores
/// above zero, letting callers fall back to the first date in the text.
pub fn date_near(
    text: &str,
    keywords: &[String],
    config: &ExtractorConfig,
    reference: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let spans = all_dates_with_spans(text, reference);
    let scoring = config.scoring;
    let mut best: Option<(i32, NaiveDate)> = None;

    for span in &spans {
        let center = (span.start + span.end) / 2;
        let window = window_around(text, center, scoring.window).to_lowercase();

        let mut score = 0;
        for keyword in keywords {
            if window.contains(keyword.as_str()) {
                score += scoring.keyword_weight;
            }
        }
        if config
            .action_words
            .iter()
            .any(|w| window.contains(w.as_str()))
        {
            score += scoring.action_weight;
        }
        if config
            .publish_markers
            .iter()
            .any(|w| window.contains(w.as_str()))
        {
            score += scoring.published_penalty;
        }

        let better = match best {
            None => true,
            Some((best_score, best_date)) => {
                score > best_score || (score == best_score && span.date < best_date)
            }
        };
        if better {
            best = Some((score, span.date));
        }
    }

    best.filter(|(score, _)| *score > 0).map(|(_, date)| date)
}

/// First date mentioned anywhere in the text.
pub fn first_date(text: &str, reference: Option<NaiveDate>) -> Option<NaiveDate> {
    all_dates_with_spans(text, reference)
        .first()
        .map(|s| s.date)
}

/// Find a date tightly bound to one of the keywords: "recovered ...
/// July 8[, 2021]" with the date starting within 60 chars after the
/// keyword, or the reverse order with the keyword within 40 chars after
/// the date.
pub fn explicit_date_with_keywords(
    text: &str,
    keywords: &[String],
    reference: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let lower = text.to_lowercase();
    let spans = all_dates_with_spans(text, reference);
    if spans.is_empty() {
        return None;
    }

    for keyword in keywords {
        // keyword then date
        let mut from = 0;
        while let Some(found) = lower[from..].find(keyword.as_str()) {
            let kw_end = from + found + keyword.len();
            if let Some(span) = spans
                .iter()
                .find(|s| s.start >= kw_end && s.start <= kw_end + 60)
            {
                return Some(span.date);
            }
            from = kw_end;
        }

        // date then keyword
        for span in &spans {
            let tail = window_around(&lower, span.end + 20, 20);
            if tail.contains(keyword.as_str()) {
                return Some(span.date);
            }
        }
    }
    None
}

/// Best event-date candidate: windowed keyword scoring, falling back to
/// the first date in the text.
pub fn event_date(
    text: &str,
    config: &ExtractorConfig,
    reference: Option<NaiveDate>,
) -> Option<NaiveDate> {
    date_near(text, &config.event_keywords, config, reference)
        .or_else(|| first_date(text, reference))
}

/// Best recovery-date candidate: tight keyword binding first, then
/// windowed scoring with recovery keywords.
pub fn recovery_date(
    text: &str,
    config: &ExtractorConfig,
    reference: Option<NaiveDate>,
) -> Option<NaiveDate> {
    explicit_date_with_keywords(text, &config.recovery_keywords, reference)
        .or_else(|| date_near(text, &config.recovery_keywords, config, reference))
}

/// Days from event to recovery, only when both resolve and the delta is
/// non-negative.
pub fn days_to_recovery(event: Option<NaiveDate>, recovery: Option<NaiveDate>) -> Option<u32> {
    let (event, recovery) = (event?, recovery?);
    let delta = (recovery - event).num_days();
    u32::try_from(delta).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExtractorConfig {
        ExtractorConfig::default()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_iso_and_long_forms_found() {
        let text = "The party left on 2021-07-06. They were last seen July 8, 2021.";
        let spans = all_dates_with_spans(text, None);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].date, date(2021, 7, 6));
        assert_eq!(spans[1].date, date(2021, 7, 8));
    }

    #[test]
    fn test_year_backfill_from_reference() {
        let text = "The hiker was last seen May 31 near the trailhead.";
        let reference = date(2022, 9, 10);
        let spans = all_dates_with_spans(text, Some(reference));
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].date, date(2022, 5, 31));
    }

    #[test]
    fn test_year_backfill_from_text_year() {
        let text = "Two hikers went missing on June 2, 2023. Crews began searching June 3.";
        let spans = all_dates_with_spans(text, None);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].date, date(2023, 6, 3));
    }

    #[test]
    fn test_yearless_date_discarded_without_any_year() {
        let text = "The climber was last seen May 31 on the ridge.";
        assert!(all_dates_with_spans(text, None).is_empty());
    }

    #[test]
    fn test_invalid_calendar_dates_skipped() {
        let text = "Reported 2021-02-30 and again February 30, 2021.";
        assert!(all_dates_with_spans(text, None).is_empty());
    }

    #[test]
    fn test_publish_penalty_dominates_event_selection() {
        let text = "The climbers disappeared on July 8, 2021 during their descent. \
                    This article was updated August 1, 2021 with new details.";
        assert_eq!(event_date(text, &config(), None), Some(date(2021, 7, 8)));
    }

    #[test]
    fn test_tie_breaks_to_earliest_date() {
        let text = "An avalanche struck on July 8, 2021. A second avalanche on July 10, 2021.";
        assert_eq!(event_date(text, &config(), None), Some(date(2021, 7, 8)));
    }

    #[test]
    fn test_event_date_falls_back_to_first_date() {
        let text = "The report was filed on 2021-09-01 at the district office.";
        assert_eq!(event_date(text, &config(), None), Some(date(2021, 9, 1)));
    }

    #[test]
    fn test_recovery_tight_binding() {
        let text = "Both bodies were recovered on July 18, 2021 by helicopter crews.";
        assert_eq!(recovery_date(text, &config(), None), Some(date(2021, 7, 18)));
    }

    #[test]
    fn test_recovery_reverse_order_binding() {
        let text = "On July 18, 2021 the bodies were located below the ridge.";
        assert_eq!(recovery_date(text, &config(), None), Some(date(2021, 7, 18)));
    }

    #[test]
    fn test_days_to_recovery_non_negative() {
        let event = Some(date(2023, 6, 2));
        let recovery = Some(date(2023, 6, 10));
        assert_eq!(days_to_recovery(event, recovery), Some(8));

        // recovery before event must be None, never negative
        assert_eq!(days_to_recovery(recovery, event), None);
        assert_eq!(days_to_recovery(event, None), None);
    }
}
