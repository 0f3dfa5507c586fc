use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::types::{
    JournalContext, ObservationFlags, RecordStatus, SamplingMethod, SliceStatus, SurveyType,
};

/// Schema 2 bins on the galactic-height axis. Schema 1 rows binned on the
/// wrong axis and are discarded on open.
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

const DEFAULT_CONFIDENCE: i64 = 50;

/// RFC 3339 UTC timestamp with microseconds and an explicit `+00:00` offset.
pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn legacy_schema_version() -> i64 {
    1
}

/// One CMDR-entered observation plus the journal context it was taken in.
///
/// Everything except `payload_hash` and `prev_hash` is the payload: it is
/// serialized once at save time, hashed into the chain, and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverNote {
    // Identity
    pub id: String,
    pub event_id: String,
    pub timestamp_utc: String,

    // Journal context
    pub system_address: Option<i64>,
    pub system_name: String,
    pub star_pos: [f64; 3],
    pub z_bin: i64,
    pub session_id: String,
    pub body_name: Option<String>,

    // Assigned by the store on first save
    pub sample_index: Option<i64>,
    pub system_index: Option<i64>,

    // CMDR input
    pub slice_status: SliceStatus,
    pub completeness_confidence: i64,
    pub sampling_method: SamplingMethod,
    pub system_count: Option<i64>,
    pub corrected_n: Option<i64>,
    pub max_distance: Option<f64>,
    pub flags: ObservationFlags,
    pub notes: String,

    // Amendment tracking
    pub supersedes_id: Option<String>,
    pub record_status: RecordStatus,

    // Versioning
    #[serde(default = "legacy_schema_version")]
    pub schema_version: i64,
    pub app_version: String,
    pub survey_type: SurveyType,
    pub boxel_highest_system: Option<String>,
    pub created_at_utc: String,

    // Chain links, kept outside the payload
    #[serde(skip)]
    pub payload_hash: Option<String>,
    #[serde(skip)]
    pub prev_hash: Option<String>,
}

impl Default for ObserverNote {
    fn default() -> Self {
        Self {
            id: String::new(),
            event_id: String::new(),
            timestamp_utc: String::new(),
            system_address: None,
            system_name: String::new(),
            star_pos: [0.0; 3],
            z_bin: 0,
            session_id: String::new(),
            body_name: None,
            sample_index: None,
            system_index: None,
            slice_status: SliceStatus::default(),
            completeness_confidence: DEFAULT_CONFIDENCE,
            sampling_method: SamplingMethod::default(),
            system_count: None,
            corrected_n: None,
            max_distance: None,
            flags: ObservationFlags::default(),
            notes: String::new(),
            supersedes_id: None,
            record_status: RecordStatus::default(),
            schema_version: CURRENT_SCHEMA_VERSION,
            app_version: String::new(),
            survey_type: SurveyType::default(),
            boxel_highest_system: None,
            created_at_utc: String::new(),
            payload_hash: None,
            prev_hash: None,
        }
    }
}

impl ObserverNote {
    /// A fresh note with a new id and both timestamps set to now.
    pub fn new() -> Self {
        let now = now_utc_iso();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp_utc: now.clone(),
            created_at_utc: now,
            ..Self::default()
        }
    }

    /// Pre-fill a note from the journal snapshot taken when the CMDR opened
    /// the observation form.
    pub fn from_context(context: &JournalContext, app_version: &str) -> Self {
        Self {
            event_id: context.last_event_id.clone().unwrap_or_default(),
            system_address: context.system_address,
            system_name: context.system_name.clone().unwrap_or_default(),
            star_pos: context.star_pos,
            z_bin: context.z_bin,
            session_id: context.session_id.clone().unwrap_or_default(),
            body_name: context.last_scan_body.clone(),
            app_version: app_version.to_string(),
            ..Self::new()
        }
    }

    /// The deletion marker appended when `original` is withdrawn. It keeps
    /// the original's observation time and sample position.
    pub fn deletion_of(original: &ObserverNote, reason: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at_utc: now_utc_iso(),
            slice_status: SliceStatus::Discard,
            notes: format!("DELETED: {reason}"),
            supersedes_id: Some(original.id.clone()),
            record_status: RecordStatus::Deleted,
            schema_version: CURRENT_SCHEMA_VERSION,
            payload_hash: None,
            prev_hash: None,
            ..original.clone()
        }
    }

    /// Check the note before it is written, deriving `corrected_n` from
    /// `system_count` first (the observer's own system counts too).
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        if let Some(count) = self.system_count {
            self.corrected_n = Some(count + 1);
        }

        let mut errors = Vec::new();
        if self.system_name.trim().is_empty() {
            errors.push("System name is required".to_string());
        }
        if self.slice_status == SliceStatus::Discard && self.notes.trim().is_empty() {
            errors.push("Discard status requires a reason in notes".to_string());
        }
        if !(0..=100).contains(&self.completeness_confidence) {
            errors.push("Completeness confidence must be 0-100".to_string());
        }
        if self.corrected_n.is_some_and(|n| n < 0) {
            errors.push("Corrected n must be non-negative".to_string());
        }
        if self.system_count.is_some_and(|n| n < 0) {
            errors.push("System count must be non-negative".to_string());
        }
        if self.max_distance.is_some_and(|d| d.is_nan() || d <= 0.0) {
            errors.push("Max distance must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(errors))
        }
    }

    /// The hashed part of the note.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Decode a stored payload. Fields added after the first release fall
    /// back to their defaults so old rows stay readable.
    pub fn from_payload(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Corrected n as written to worksheets: the stored value, else count + 1.
    pub fn effective_corrected_n(&self) -> Option<i64> {
        self.corrected_n.or(self.system_count.map(|c| c + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_note() -> ObserverNote {
        ObserverNote {
            system_name: "Synuefe AA-A h0".to_string(),
            ..ObserverNote::new()
        }
    }

    #[test]
    fn new_note_has_defaults() {
        let note = ObserverNote::new();
        assert_eq!(note.id.len(), 36);
        assert_eq!(note.slice_status, SliceStatus::InProgress);
        assert_eq!(note.completeness_confidence, 50);
        assert_eq!(note.record_status, RecordStatus::Active);
        assert_eq!(note.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(note.survey_type, SurveyType::RegularDensity);
        assert!(note.timestamp_utc.ends_with("+00:00"));
    }

    #[test]
    fn validate_derives_corrected_n() {
        let mut note = ObserverNote {
            system_count: Some(41),
            corrected_n: Some(7),
            ..valid_note()
        };
        note.validate().unwrap();
        assert_eq!(note.corrected_n, Some(42));
    }

    #[test]
    fn validate_collects_every_error() {
        let mut note = ObserverNote {
            system_name: "  ".to_string(),
            slice_status: SliceStatus::Discard,
            completeness_confidence: 101,
            system_count: Some(-5),
            max_distance: Some(0.0),
            ..ObserverNote::new()
        };
        let err = note.validate().unwrap_err();
        assert_eq!(
            err.messages(),
            [
                "System name is required",
                "Discard status requires a reason in notes",
                "Completeness confidence must be 0-100",
                "Corrected n must be non-negative",
                "System count must be non-negative",
                "Max distance must be positive",
            ]
        );
        assert!(err
            .to_string()
            .starts_with("Validation failed: System name is required; Discard"));
    }

    #[test]
    fn negative_confidence_from_a_payload_fails_validation() {
        let mut payload = valid_note().payload().unwrap();
        payload["completeness_confidence"] = serde_json::json!(-1);
        let mut note = ObserverNote::from_payload(&payload.to_string()).unwrap();
        assert_eq!(note.completeness_confidence, -1);
        let err = note.validate().unwrap_err();
        assert_eq!(err.messages(), ["Completeness confidence must be 0-100"]);
    }

    #[test]
    fn discard_with_reason_is_valid() {
        let mut note = ObserverNote {
            slice_status: SliceStatus::Discard,
            notes: "jumped too early".to_string(),
            ..valid_note()
        };
        assert!(note.validate().is_ok());
    }

    #[test]
    fn payload_excludes_chain_hashes() {
        let note = ObserverNote {
            payload_hash: Some("abc".to_string()),
            prev_hash: Some("def".to_string()),
            ..valid_note()
        };
        let payload = note.payload().unwrap();
        assert!(payload.get("payload_hash").is_none());
        assert!(payload.get("prev_hash").is_none());
        assert_eq!(payload["system_name"], "Synuefe AA-A h0");
        assert_eq!(payload["slice_status"], "in_progress");
    }

    #[test]
    fn legacy_payload_decodes_with_defaults() {
        let note = ObserverNote::from_payload(
            r#"{"id":"n1","system_name":"Sol","star_pos":[0.0,1.0,2.0],"flags":{"bias_risk":true}}"#,
        )
        .unwrap();
        assert_eq!(note.schema_version, 1);
        assert_eq!(note.survey_type, SurveyType::RegularDensity);
        assert!(note.flags.bias_risk);
        assert_eq!(note.star_pos, [0.0, 1.0, 2.0]);
    }

    #[test]
    fn from_context_copies_journal_fields() {
        let context = JournalContext {
            system_name: Some("Col 285 Sector AB-C d1".to_string()),
            system_address: Some(42),
            star_pos: [1.0, 148.0, 3.0],
            z_bin: 150,
            last_scan_body: Some("Col 285 Sector AB-C d1 A 1".to_string()),
            last_event_id: Some("0123456789abcdef".to_string()),
            session_id: Some("CMDR_1".to_string()),
            ..JournalContext::default()
        };
        let note = ObserverNote::from_context(&context, "1.2.3");
        assert_eq!(note.system_name, "Col 285 Sector AB-C d1");
        assert_eq!(note.z_bin, 150);
        assert_eq!(note.event_id, "0123456789abcdef");
        assert_eq!(note.session_id, "CMDR_1");
        assert_eq!(note.app_version, "1.2.3");
        assert_eq!(note.body_name.as_deref(), Some("Col 285 Sector AB-C d1 A 1"));
    }

    #[test]
    fn deletion_marker_supersedes_original() {
        let original = valid_note();
        let marker = ObserverNote::deletion_of(&original, "duplicate");
        assert_ne!(marker.id, original.id);
        assert_eq!(marker.supersedes_id.as_deref(), Some(original.id.as_str()));
        assert_eq!(marker.slice_status, SliceStatus::Discard);
        assert_eq!(marker.notes, "DELETED: duplicate");
        assert_eq!(marker.record_status, RecordStatus::Deleted);
        assert_eq!(marker.system_name, original.system_name);
        assert_eq!(marker.timestamp_utc, original.timestamp_utc);
    }
}
