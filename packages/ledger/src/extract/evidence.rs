//! Evidence location: a supporting sentence per classified field.
//!
//! For a small fixed set of field categories, finds the first pattern
//! occurrence and returns the enclosing sentence (bounded by the nearest
//! preceding and following period/newline) as a provenance quote.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::extraction::QuotedEvidence;

/// Field categories and the pattern that anchors each one's quote.
static EVIDENCE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "cause_primary",
            Regex::new(
                r"(?i)\b(avalanche|rockfall|rock fall|crevasse|tree well|drowned|drowning|lightning|hypothermia|fell|fall)\b",
            )
            .expect("valid regex"),
        ),
        (
            "date_of_death",
            Regex::new(r"(?i)\b(died|killed|dead|deceased|perished|fatal)\b").expect("valid regex"),
        ),
        (
            "search_started",
            Regex::new(r"(?i)\bsearch\b").expect("valid regex"),
        ),
        (
            "date_recovery",
            Regex::new(r"(?i)\b(recovered|located|found)\b").expect("valid regex"),
        ),
    ]
});

/// The sentence enclosing a byte offset: from just after the previous
/// period/newline through the next one.
fn enclosing_sentence(text: &str, at: usize) -> Option<String> {
    let start = text[..at]
        .rfind(['.', '\n'])
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = text[at..]
        .find(['.', '\n'])
        .map(|i| at + i + 1)
        .unwrap_or(text.len());

    let sentence = text[start..end].trim();
    if sentence.is_empty() {
        None
    } else {
        Some(sentence.to_string())
    }
}

/// Locate a supporting quote for each field category found in the text.
pub fn locate(text: &str) -> QuotedEvidence {
    let mut quotes = QuotedEvidence::new();
    for (field, pattern) in EVIDENCE_PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            if let Some(sentence) = enclosing_sentence(text, m.start()) {
                quotes.insert(field.to_string(), sentence);
            }
        }
    }
    quotes
}
