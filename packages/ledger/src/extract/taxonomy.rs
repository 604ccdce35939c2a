//! Closed-vocabulary classifiers for activity, cause, phase, and
//! contributing factors.
//!
//! Vocabularies are ordered (label, keyword-set) tables evaluated by one
//! generic first-match routine, so new categories are additions to data,
//! not new conditional branches.

use crate::types::incident::Activity;

/// An ordered keyword table: first label whose keyword set matches wins.
pub type KeywordTable = &'static [(&'static str, &'static [&'static str])];

/// Activity vocabulary. Ski compounds come first so "ski-mountaineering"
/// is not claimed by the bare "mountaineering" token.
pub const ACTIVITY_TABLE: KeywordTable = &[
    (
        "ski-mountaineering",
        &[
            "ski-mountaineering",
            "ski mountaineering",
            "ski touring",
            "ski tourer",
            "heli-ski",
            "splitboard",
            "skiing",
            "skier",
        ],
    ),
    (
        "alpinism",
        &["mountaineer", "alpinist", "alpinism", "mountaineering"],
    ),
    ("climbing", &["climbing", "climber"]),
    (
        "hiking",
        &["hiking", "hiker", "scrambling", "scrambler", "backpacking", "snowshoe"],
    ),
];

/// Primary-cause vocabulary. "fall" is last so rockfall/tree-well
/// phrasing is not shadowed by the bare token.
pub const CAUSE_TABLE: KeywordTable = &[
    ("avalanche", &["avalanche", "cornice break", "slab release"]),
    ("rockfall", &["rockfall", "rock fall", "icefall"]),
    ("crevasse", &["crevasse"]),
    ("tree-well", &["tree well", "tree-well"]),
    ("drowning", &["drowned", "drowning"]),
    ("lightning", &["lightning"]),
    ("hypothermia", &["hypothermia", "exposure to the elements"]),
    ("fall", &["fell", "fall"]),
];

/// Phase-of-climb vocabulary, in priority order.
pub const PHASE_TABLE: KeywordTable = &[
    ("descent", &["descent", "descending", "on the way down"]),
    ("ascent", &["ascent", "ascending", "on the way up"]),
    ("summit", &["summit"]),
];

/// Contributing factors: additive, each detected independently.
pub const FACTOR_TABLE: KeywordTable = &[
    ("cornices (typical)", &["cornice"]),
    (
        "spring snowmelt/warming",
        &["warming", "spring snowmelt", "spring conditions"],
    ),
    (
        "steep terrain",
        &["steep", "steep terrain", "steep faces", "volcanic"],
    ),
];

/// First label in priority order whose keyword set matches.
pub fn first_match(text_lower: &str, table: KeywordTable) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| text_lower.contains(kw)))
        .map(|(label, _)| *label)
}

/// All labels whose keyword set matches (for additive vocabularies).
pub fn all_matches(text_lower: &str, table: KeywordTable) -> Vec<&'static str> {
    table
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| text_lower.contains(kw)))
        .map(|(label, _)| *label)
        .collect()
}

/// Classify activity into the closed vocabulary.
pub fn classify_activity(text_lower: &str) -> Option<Activity> {
    first_match(text_lower, ACTIVITY_TABLE).map(Activity::normalize)
}

/// Classify the primary cause.
pub fn classify_cause(text_lower: &str) -> Option<&'static str> {
    first_match(text_lower, CAUSE_TABLE)
}

/// Classify the phase of climb.
pub fn classify_phase(text_lower: &str) -> Option<&'static str> {
    first_match(text_lower, PHASE_TABLE)
}

/// Detect contributing factors.
pub fn contributing_factors(text_lower: &str) -> Vec<String> {
    all_matches(text_lower, FACTOR_TABLE)
        .into_iter()
        .map(|label| label.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_priority() {
        assert_eq!(
            classify_activity("two mountaineers were reported overdue"),
            Some(Activity::Alpinism)
        );
        assert_eq!(
            classify_activity("a ski-mountaineering trip up the glacier"),
            Some(Activity::SkiMountaineering)
        );
        assert_eq!(
            classify_activity("the hikers left the trailhead"),
            Some(Activity::Hiking)
        );
        assert_eq!(classify_activity("a boating accident"), None);
    }

    #[test]
    fn test_cause_rockfall_not_shadowed_by_fall() {
        assert_eq!(classify_cause("killed by rockfall below the col"), Some("rockfall"));
        assert_eq!(classify_cause("died in a fall from the ridge"), Some("fall"));
        assert_eq!(classify_cause("buried by an avalanche"), Some("avalanche"));
        assert_eq!(classify_cause("trapped in a tree well"), Some("tree-well"));
    }

    #[test]
    fn test_phase_priority_order() {
        assert_eq!(classify_phase("fell during the descent from the summit"), Some("descent"));
        assert_eq!(classify_phase("collapsed on the ascent"), Some("ascent"));
        assert_eq!(classify_phase("reached the summit at noon"), Some("summit"));
    }

    #[test]
    fn test_factors_are_additive() {
        let factors =
            contributing_factors("cornice failure after days of warming on steep terrain");
        assert_eq!(
            factors,
            vec![
                "cornices (typical)".to_string(),
                "spring snowmelt/warming".to_string(),
                "steep terrain".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_match_yields_nothing() {
        assert_eq!(first_match("calm sunny day", CAUSE_TABLE), None);
        assert!(contributing_factors("calm sunny day").is_empty());
    }
}
