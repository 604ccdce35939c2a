//! Incident records and the closed vocabularies they are built from.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of recognized jurisdictions.
///
/// A jurisdiction scopes search, geocoding bounds, and timezone defaults.
/// Anything outside this set is treated as unknown, never stored as
/// free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Jurisdiction {
    /// British Columbia, Canada
    BC,
    /// Alberta, Canada
    AB,
    /// Washington State, USA
    WA,
}

impl Jurisdiction {
    /// All recognized codes, in scoring order.
    pub const ALL: [Jurisdiction; 3] = [Jurisdiction::BC, Jurisdiction::AB, Jurisdiction::WA];

    /// Parse a jurisdiction code. Only the three recognized codes pass;
    /// anything else (including "unknown", "CA", full province names)
    /// yields None.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BC" => Some(Jurisdiction::BC),
            "AB" => Some(Jurisdiction::AB),
            "WA" => Some(Jurisdiction::WA),
            _ => None,
        }
    }

    /// Two-letter code as stored.
    pub fn code(&self) -> &'static str {
        match self {
            Jurisdiction::BC => "BC",
            Jurisdiction::AB => "AB",
            Jurisdiction::WA => "WA",
        }
    }

    /// ISO 3166-1 alpha-2 country code.
    pub fn iso_country(&self) -> &'static str {
        match self {
            Jurisdiction::BC | Jurisdiction::AB => "CA",
            Jurisdiction::WA => "US",
        }
    }

    /// Administrative-area display name.
    pub fn admin_area(&self) -> &'static str {
        match self {
            Jurisdiction::BC => "British Columbia",
            Jurisdiction::AB => "Alberta",
            Jurisdiction::WA => "Washington",
        }
    }

    /// IANA timezone for local-time derivation.
    pub fn timezone(&self) -> &'static str {
        match self {
            Jurisdiction::BC | Jurisdiction::WA => "America/Vancouver",
            Jurisdiction::AB => "America/Edmonton",
        }
    }
}

/// Closed activity vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Activity {
    Alpinism,
    Climbing,
    SkiMountaineering,
    Hiking,
    Unknown,
}

impl Activity {
    /// Label as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Alpinism => "alpinism",
            Activity::Climbing => "climbing",
            Activity::SkiMountaineering => "ski-mountaineering",
            Activity::Hiking => "hiking",
            Activity::Unknown => "unknown",
        }
    }

    /// Normalize a free-text activity through the synonym table and clamp
    /// to the closed vocabulary. Unrecognized values become `Unknown`.
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "alpinism" | "mountaineering" | "alpine climbing" => Activity::Alpinism,
            "climbing" | "rock climbing" | "ice climbing" => Activity::Climbing,
            "ski-mountaineering" | "ski mountaineering" | "skiing" | "ski touring"
            | "heli-skiing" | "backcountry skiing" | "splitboarding" => {
                Activity::SkiMountaineering
            }
            "hiking" | "scrambling" | "backpacking" | "snowshoeing" => Activity::Hiking,
            _ => Activity::Unknown,
        }
    }
}

/// Operation type for a SAR segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SarOpType {
    Search,
    Recovery,
    Rescue,
}

impl SarOpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SarOpType::Search => "search",
            SarOpType::Recovery => "recovery",
            SarOpType::Rescue => "rescue",
        }
    }

    /// Parse a refiner-supplied op type; out-of-vocabulary values fail.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "search" => Some(SarOpType::Search),
            "recovery" => Some(SarOpType::Recovery),
            "rescue" => Some(SarOpType::Rescue),
            _ => None,
        }
    }
}

/// One discrete search, rescue, or recovery operational phase.
///
/// The segment set on a record is always replaced wholesale, never
/// appended to, so re-extraction cannot accumulate duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarSegment {
    pub op_type: SarOpType,
    pub agency: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
}

impl SarSegment {
    /// Create a segment dated by a calendar date promoted to midnight UTC.
    pub fn on_date(op_type: SarOpType, date: NaiveDate) -> Self {
        let at = midnight_utc(date);
        Self {
            op_type,
            agency: None,
            started_at: Some(at),
            ended_at: Some(at),
            outcome: None,
        }
    }

    /// Set the outcome tag.
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }
}

/// Promote a calendar date to a midnight UTC timestamp.
pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap_or_default(), Utc)
}

/// One mountain-fatality event.
///
/// Created on the first ingested document for a new URL; mutated by
/// extraction and reconciliation passes; never deleted by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub event_id: Uuid,
    pub jurisdiction: Option<Jurisdiction>,
    pub location_name: Option<String>,
    pub peak_name: Option<String>,
    pub route_name: Option<String>,
    pub event_type: Option<String>,
    pub activity: Option<Activity>,
    pub cause_primary: Option<String>,
    pub contributing_factors: Option<Vec<String>>,
    pub n_fatalities: Option<u32>,
    pub n_injured: Option<u32>,
    pub party_size: Option<u32>,
    pub date_event_start: Option<NaiveDate>,
    pub date_event_end: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
    pub date_recovery: Option<NaiveDate>,
    pub time_to_recovery_days: Option<u32>,
    pub iso_country: Option<String>,
    pub admin_area: Option<String>,
    pub tz_local: Option<String>,
    pub phase: Option<String>,
    pub names_all: Option<Vec<String>>,
    pub names_deceased: Option<Vec<String>>,
    pub names_relatives: Option<Vec<String>>,
    pub names_responders: Option<Vec<String>>,
    pub names_spokespersons: Option<Vec<String>>,
    pub names_medics: Option<Vec<String>>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl IncidentRecord {
    /// A fresh record with only identity and creation time set.
    pub fn new(event_id: Uuid) -> Self {
        Self {
            event_id,
            created_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

/// Partial update of an incident record.
///
/// `None` means "leave the field untouched"; `Some` overwrites. This is
/// the unit the reconciliation merger produces and stores consume.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentPatch {
    pub jurisdiction: Option<Jurisdiction>,
    pub location_name: Option<String>,
    pub peak_name: Option<String>,
    pub route_name: Option<String>,
    pub event_type: Option<String>,
    pub activity: Option<Activity>,
    pub cause_primary: Option<String>,
    pub contributing_factors: Option<Vec<String>>,
    pub n_fatalities: Option<u32>,
    pub n_injured: Option<u32>,
    pub party_size: Option<u32>,
    pub date_event_start: Option<NaiveDate>,
    pub date_event_end: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
    pub date_recovery: Option<NaiveDate>,
    pub time_to_recovery_days: Option<u32>,
    pub iso_country: Option<String>,
    pub admin_area: Option<String>,
    pub tz_local: Option<String>,
    pub phase: Option<String>,
    pub names_all: Option<Vec<String>>,
    pub names_deceased: Option<Vec<String>>,
    pub names_relatives: Option<Vec<String>>,
    pub names_responders: Option<Vec<String>>,
    pub names_spokespersons: Option<Vec<String>>,
    pub names_medics: Option<Vec<String>>,
}

impl IncidentPatch {
    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this patch to a record in place.
    ///
    /// Enforces the date-ordering invariant: when both event dates end up
    /// present, `date_event_end` is clamped to be >= `date_event_start`.
    pub fn apply(&self, record: &mut IncidentRecord) {
        macro_rules! set {
            ($field:ident) => {
                if let Some(value) = &self.$field {
                    record.$field = Some(value.clone());
                }
            };
        }

        set!(jurisdiction);
        set!(location_name);
        set!(peak_name);
        set!(route_name);
        set!(event_type);
        set!(activity);
        set!(cause_primary);
        set!(contributing_factors);
        set!(n_fatalities);
        set!(n_injured);
        set!(party_size);
        set!(date_event_start);
        set!(date_event_end);
        set!(date_of_death);
        set!(date_recovery);
        set!(time_to_recovery_days);
        set!(iso_country);
        set!(admin_area);
        set!(tz_local);
        set!(phase);
        set!(names_all);
        set!(names_deceased);
        set!(names_relatives);
        set!(names_responders);
        set!(names_spokespersons);
        set!(names_medics);

        if let (Some(start), Some(end)) = (record.date_event_start, record.date_event_end) {
            if end < start {
                record.date_event_end = Some(start);
            }
        }
        record.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jurisdiction_parse_closed_set() {
        assert_eq!(Jurisdiction::parse("BC"), Some(Jurisdiction::BC));
        assert_eq!(Jurisdiction::parse(" wa "), Some(Jurisdiction::WA));
        assert_eq!(Jurisdiction::parse("Unknown"), None);
        assert_eq!(Jurisdiction::parse("CA"), None);
        assert_eq!(Jurisdiction::parse("British Columbia"), None);
    }

    #[test]
    fn test_jurisdiction_metadata() {
        assert_eq!(Jurisdiction::AB.iso_country(), "CA");
        assert_eq!(Jurisdiction::AB.timezone(), "America/Edmonton");
        assert_eq!(Jurisdiction::WA.iso_country(), "US");
        assert_eq!(Jurisdiction::BC.admin_area(), "British Columbia");
    }

    #[test]
    fn test_activity_normalize_synonyms() {
        assert_eq!(Activity::normalize("mountaineering"), Activity::Alpinism);
        assert_eq!(Activity::normalize("Heli-Skiing"), Activity::SkiMountaineering);
        assert_eq!(Activity::normalize("scrambling"), Activity::Hiking);
        assert_eq!(Activity::normalize("base jumping"), Activity::Unknown);
    }

    #[test]
    fn test_patch_clamps_event_dates() {
        let mut record = IncidentRecord::new(Uuid::new_v4());
        let patch = IncidentPatch {
            date_event_start: NaiveDate::from_ymd_opt(2023, 6, 10),
            date_event_end: NaiveDate::from_ymd_opt(2023, 6, 2),
            ..Default::default()
        };
        patch.apply(&mut record);
        assert_eq!(record.date_event_start, NaiveDate::from_ymd_opt(2023, 6, 10));
        assert_eq!(record.date_event_end, NaiveDate::from_ymd_opt(2023, 6, 10));
    }

    #[test]
    fn test_patch_none_leaves_untouched() {
        let mut record = IncidentRecord::new(Uuid::new_v4());
        record.activity = Some(Activity::Climbing);
        IncidentPatch::default().apply(&mut record);
        assert_eq!(record.activity, Some(Activity::Climbing));
    }

    #[test]
    fn test_sar_segment_midnight_promotion() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 10).unwrap();
        let seg = SarSegment::on_date(SarOpType::Recovery, date);
        let at = seg.started_at.unwrap();
        assert_eq!(at.date_naive(), date);
        assert_eq!(at.time(), chrono::NaiveTime::MIN);
    }
}
