//! Fatality-count extraction from numeric or word-form mentions.
//!
//! Pattern variants are tried in priority order; the first variant whose
//! captured segment parses to a count wins. Number words are recognized
//! only up to ten — higher word cardinals are a documented limitation.

use regex::Regex;
use std::sync::LazyLock;

/// Pattern ladder, most specific first. Each pattern captures exactly one
/// segment expected to hold the count.
static FATALITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // "two climbers (were/went) killed|dead|missing|..."
        r"\b(\w+)\s+(?:men|people|persons|climbers|mountaineers|hikers|skiers)\s+(?:(?:were|are|was|have|had|went)\s+)?(?:killed|dead|deceased|lost|missing|perished)\b",
        // "recovered ... two"
        r"\b(?:recovery|recovered)\b.{0,40}\b(\w+)\b",
        // "bodies ... two"
        r"\bbodies?\b.{0,10}\b(\w+)\b",
        // "two bodies|victims"
        r"\b(\w+)\s+(?:bodies|victims)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\b").expect("valid regex"));

/// Parse a count from a word or digit segment. Word forms stop at ten.
fn count_from_segment(segment: &str) -> Option<u32> {
    let word = match segment.trim() {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        _ => None,
    };
    if word.is_some() {
        return word;
    }
    DIGITS
        .captures(segment)
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Extract a fatality count from lowercased text, if any pattern yields one.
pub fn fatality_count(text_lower: &str) -> Option<u32> {
    for pattern in FATALITY_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text_lower) {
            if let Some(count) = count_from_segment(&caps[1]) {
                return Some(count);
            }
        }
    }
    None
}
