//! Type definitions for `survey_core`.
//!
//! Closed vocabularies, observation flags, and the snapshot types handed
//! from the journal side to the observation side.

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

// ---------------------------------------------------------------------------
// Closed vocabularies
// ---------------------------------------------------------------------------

/// Declares a fieldless enum whose serialized form is a fixed snake_case string.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Where a density slice stands from the CMDR's point of view.
    SliceStatus {
        #[default]
        InProgress => "in_progress",
        Complete => "complete",
        Partial => "partial",
        Discard => "discard",
    }
);

string_enum!(
    SamplingMethod {
        #[default]
        Random => "random",
        Grid => "grid",
        RouteFollow => "route_follow",
        Targeted => "targeted",
        Other => "other",
    }
);

string_enum!(
    /// Lifecycle of a stored row. Only `Active` rows take part in counting
    /// and exports; the others are kept for the audit trail.
    RecordStatus {
        #[default]
        Active => "active",
        Amended => "amended",
        Deleted => "deleted",
        Reset => "reset",
    }
);

string_enum!(
    SurveyType {
        #[default]
        RegularDensity => "regular_density",
        LogarithmicDensity => "logarithmic_density",
        BoxelSize => "boxel_size",
    }
);

impl SurveyType {
    pub fn display_name(self) -> &'static str {
        match self {
            SurveyType::RegularDensity => "Regular Density Scan",
            SurveyType::LogarithmicDensity => "Logarithmic Density Scan",
            SurveyType::BoxelSize => "Boxel Size Survey",
        }
    }

    /// Density surveys feed the density worksheet; boxel surveys do not.
    pub fn is_density(self) -> bool {
        matches!(
            self,
            SurveyType::RegularDensity | SurveyType::LogarithmicDensity
        )
    }
}

// ---------------------------------------------------------------------------
// Observation flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationFlags {
    pub bias_risk: bool,
    pub low_coverage: bool,
    pub anomaly_suspected: bool,
    pub interrupted: bool,
    pub repeat_needed: bool,
}

impl ObservationFlags {
    pub fn any_set(&self) -> bool {
        self.bias_risk
            || self.low_coverage
            || self.anomaly_suspected
            || self.interrupted
            || self.repeat_needed
    }

    /// Names of the raised flags, in declaration order.
    pub fn raised(&self) -> Vec<&'static str> {
        [
            ("bias_risk", self.bias_risk),
            ("low_coverage", self.low_coverage),
            ("anomaly_suspected", self.anomaly_suspected),
            ("interrupted", self.interrupted),
            ("repeat_needed", self.repeat_needed),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Journal context snapshots
// ---------------------------------------------------------------------------

/// Immutable copy of what the journal has told us so far. Handed to
/// whoever is about to record an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalContext {
    pub system_name: Option<String>,
    pub system_address: Option<i64>,
    pub star_pos: [f64; 3],
    pub z_bin: i64,
    pub last_scan_body: Option<String>,
    pub last_event_id: Option<String>,
    pub last_event_timestamp: Option<String>,
    pub session_id: Option<String>,
    pub cmdr_name: Option<String>,
    pub last_sample_z_bin: Option<i64>,
    /// +1 when climbing the survey axis, -1 when descending.
    pub z_direction: i64,
}

impl Default for JournalContext {
    fn default() -> Self {
        Self {
            system_name: None,
            system_address: None,
            star_pos: [0.0; 3],
            z_bin: 0,
            last_scan_body: None,
            last_event_id: None,
            last_event_timestamp: None,
            session_id: None,
            cmdr_name: None,
            last_sample_z_bin: None,
            z_direction: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZBinChange {
    pub old_z_bin: i64,
    pub new_z_bin: i64,
    pub system_name: String,
    pub star_pos: [f64; 3],
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZTarget {
    pub last_sample_z_bin: Option<i64>,
    pub target_z: i64,
    pub direction: i64,
    /// Current survey-axis coordinate in light years.
    pub current_z: f64,
}

// ---------------------------------------------------------------------------
// Store-facing records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    pub current_sample: i64,
    pub current_systems: i64,
    pub total_samples: i64,
}

/// Outcome of walking the observation hash chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub last_good_id: Option<String>,
    pub checked: usize,
    pub errors: Vec<String>,
}

/// One answer to "what is the highest-numbered system in this boxel?".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxelEntry {
    pub id: String,
    pub created_at_utc: String,
    pub cmdr_name: String,
    pub system_name: String,
    pub system_address: Option<i64>,
    pub star_pos: [f64; 3],
    pub boxel_highest_system: String,
    pub session_id: String,
    pub record_status: RecordStatus,
}

/// An Earth-like or terraformable body seen in a Scan event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub timestamp_utc: String,
    pub event: String,
    pub event_id: String,
    pub cmdr_name: String,
    pub session_id: String,

    pub star_system: String,
    pub system_address: Option<i64>,
    pub body_name: String,
    pub body_id: Option<i64>,

    pub candidate_type: String,
    pub planet_class: String,
    pub terraform_state: String,
    pub atmosphere: String,
    pub volcanism: String,
    pub landable: Option<bool>,
    pub tidal_lock: Option<bool>,
    pub was_discovered: Option<bool>,
    pub was_mapped: Option<bool>,

    pub distance_from_arrival_ls: Option<f64>,
    pub surface_temp_k: Option<f64>,
    pub surface_gravity_g: Option<f64>,
    pub surface_pressure_atm: Option<f64>,
    pub mass_em: Option<f64>,
    pub radius_km: Option<f64>,
    pub rotation_period_days: Option<f64>,
    pub orbital_period_days: Option<f64>,
    pub semi_major_axis_au: Option<f64>,
    pub orbital_eccentricity: Option<f64>,
    pub axial_tilt_deg: Option<f64>,

    pub earth2_rating: String,
    pub similarity_score: f64,
    pub goldilocks_score: i64,
    pub goldilocks_category: String,
    pub worth_landing: String,
    pub worth_reason: String,

    pub distance_from_sol_ly: f64,
    pub star_pos: [f64; 3],
}

impl CandidateRecord {
    pub fn is_elw(&self) -> bool {
        self.candidate_type == crate::rating::ELW_CANDIDATE_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_their_text() {
        for status in SliceStatus::ALL {
            assert_eq!(status.as_str().parse::<SliceStatus>(), Ok(*status));
        }
        assert_eq!(
            serde_json::to_string(&SamplingMethod::RouteFollow).unwrap(),
            "\"route_follow\""
        );
        assert_eq!(
            "logarithmic_density".parse::<SurveyType>(),
            Ok(SurveyType::LogarithmicDensity)
        );
    }

    #[test]
    fn unknown_text_names_the_enum() {
        let err = "sideways".parse::<SliceStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown SliceStatus 'sideways'");
    }

    #[test]
    fn flags_report_raised_names() {
        let flags = ObservationFlags {
            low_coverage: true,
            repeat_needed: true,
            ..ObservationFlags::default()
        };
        assert!(flags.any_set());
        assert_eq!(flags.raised(), vec!["low_coverage", "repeat_needed"]);
        assert!(!ObservationFlags::default().any_set());
    }

    #[test]
    fn flags_tolerate_missing_keys() {
        let flags: ObservationFlags = serde_json::from_str(r#"{"bias_risk":true}"#).unwrap();
        assert!(flags.bias_risk);
        assert!(!flags.interrupted);
    }

    #[test]
    fn boxel_survey_is_not_density() {
        assert!(SurveyType::RegularDensity.is_density());
        assert!(!SurveyType::BoxelSize.is_density());
    }
}
