//! Spatial classification: peak/park/place names and jurisdiction.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::config::ExtractorConfig;
use crate::types::incident::Jurisdiction;

static RE_MOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Mount|Mt\.?)\s+[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)?").expect("valid regex")
});

static RE_FEATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\s+(?:Peak|Mountain|Glacier|Pass|Ridge|Couloir)\b")
        .expect("valid regex")
});

static RE_PARK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*\s+(?:Provincial|National|State)\s+Park\b")
        .expect("valid regex")
});

static RE_NEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:near|in|at)\s+([A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)?)").expect("valid regex")
});

/// What the spatial pass recovered from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialRead {
    pub peak_name: Option<String>,
    pub park_name: Option<String>,
    pub near_place: Option<String>,
    pub location_name: Option<String>,
    pub jurisdiction: Option<Jurisdiction>,
}

/// Earliest peak/feature phrase in the text, if any.
fn find_peak(text: &str) -> Option<String> {
    let mount = RE_MOUNT.find(text);
    let feature = RE_FEATURE.find(text);
    match (mount, feature) {
        (Some(a), Some(b)) => Some(if a.start() <= b.start() { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
    .map(|m| m.as_str().trim().to_string())
}

fn find_park(text: &str) -> Option<String> {
    RE_PARK.find(text).map(|m| m.as_str().to_string())
}

/// First "near/in/at <Capitalized>" place that survives the denylist and
/// is not just a repeat of the peak or park phrase.
fn find_near_place(
    text: &str,
    config: &ExtractorConfig,
    peak: Option<&str>,
    park: Option<&str>,
) -> Option<String> {
    for caps in RE_NEAR.captures_iter(text) {
        let candidate = caps.get(1)?.as_str().trim();
        let lower = candidate.to_lowercase();
        let denied = config.place_denylist.iter().any(|deny| {
            lower == *deny || lower.starts_with(&format!("{} ", deny))
        });
        if denied {
            continue;
        }
        if peak.is_some_and(|p| p.contains(candidate) || candidate.contains(p)) {
            continue;
        }
        if park.is_some_and(|p| p.contains(candidate)) {
            continue;
        }
        return Some(candidate.to_string());
    }
    None
}

/// Score the region token sets by substring occurrence counts (not just
/// presence); highest score wins, ties decide nothing.
fn classify_jurisdiction(text_lower: &str, config: &ExtractorConfig) -> Option<Jurisdiction> {
    let mut scores: Vec<(Jurisdiction, usize)> = config
        .regions
        .iter()
        .map(|region| {
            let count = region
                .tokens
                .iter()
                .map(|token| text_lower.matches(token.as_str()).count())
                .sum();
            (region.jurisdiction, count)
        })
        .collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    match scores.as_slice() {
        [(winner, top), rest @ ..] if *top > 0 => {
            if rest.iter().any(|(_, score)| score == top) {
                None // tie: refuse to guess
            } else {
                Some(*winner)
            }
        }
        _ => None,
    }
}

/// Run the full spatial pass.
pub fn classify(text: &str, text_lower: &str, config: &ExtractorConfig) -> SpatialRead {
    let peak_name = find_peak(text);
    let park_name = find_park(text);
    let near_place = find_near_place(text, config, peak_name.as_deref(), park_name.as_deref());

    let mut parts: Vec<String> = Vec::new();
    if let Some(peak) = &peak_name {
        parts.push(peak.clone());
    }
    if let Some(park) = &park_name {
        parts.push(park.clone());
    }
    if let Some(place) = &near_place {
        parts.push(format!("near {}", place));
    }
    let location_name = if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    };

    SpatialRead {
        peak_name,
        park_name,
        near_place,
        location_name,
        jurisdiction: classify_jurisdiction(text_lower, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> SpatialRead {
        let config = ExtractorConfig::default();
        classify(text, &text.to_lowercase(), &config)
    }

    #[test]
    fn test_mount_prefix_peak() {
        let result = read("Two hikers went missing near Mount Example on June 2.");
        assert_eq!(result.peak_name.as_deref(), Some("Mount Example"));
    }

    #[test]
    fn test_feature_suffix_peak() {
        let result = read("The slide released below Atwell Peak during the descent.");
        assert_eq!(result.peak_name.as_deref(), Some("Atwell Peak"));
    }

    #[test]
    fn test_park_and_near_composite_location() {
        let result =
            read("Atwell Peak rises in Garibaldi Provincial Park near Squamish in British Columbia.");
        assert_eq!(result.park_name.as_deref(), Some("Garibaldi Provincial Park"));
        assert_eq!(result.near_place.as_deref(), Some("Squamish"));
        assert_eq!(
            result.location_name.as_deref(),
            Some("Atwell Peak, Garibaldi Provincial Park, near Squamish")
        );
    }

    #[test]
    fn test_denylist_filters_social_media() {
        let result = read("Share the alert at Facebook for updates.");
        assert!(result.near_place.is_none());
    }

    #[test]
    fn test_near_place_not_duplicate_of_peak() {
        let result = read("Crews searched near Mount Example all week.");
        assert_eq!(result.peak_name.as_deref(), Some("Mount Example"));
        assert!(result.near_place.is_none());
    }

    #[test]
    fn test_jurisdiction_scoring() {
        let result = read("The Squamish RCMP said the Garibaldi area remains closed.");
        assert_eq!(result.jurisdiction, Some(Jurisdiction::BC));

        let result = read("Parks staff in Banff and Canmore closed the Kananaskis trails.");
        assert_eq!(result.jurisdiction, Some(Jurisdiction::AB));
    }

    #[test]
    fn test_jurisdiction_tie_decides_nothing() {
        let result = read("Crews from Banff and Squamish assisted.");
        assert_eq!(result.jurisdiction, None);
    }

    #[test]
    fn test_occurrence_counts_break_presence_ties() {
        // One Alberta token, but BC mentioned twice: counts, not presence.
        let result = read("Squamish crews left Squamish for the Banff staging area.");
        assert_eq!(result.jurisdiction, Some(Jurisdiction::BC));
    }
}
