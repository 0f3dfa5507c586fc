use serde_json::Value;

use crate::hash::generate_event_id;

/// The journal events this tool reacts to. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Commander,
    LoadGame,
    Location,
    FsdJump,
    Scan,
    SaaScanComplete,
    Other,
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Commander" => EventKind::Commander,
            "LoadGame" => EventKind::LoadGame,
            "Location" => EventKind::Location,
            "FSDJump" => EventKind::FsdJump,
            "Scan" => EventKind::Scan,
            "SAAScanComplete" => EventKind::SaaScanComplete,
            _ => EventKind::Other,
        }
    }

    /// Events worth replaying from the head of a journal to rebuild context.
    pub fn seeds_state(self) -> bool {
        matches!(
            self,
            EventKind::Commander | EventKind::LoadGame | EventKind::Location | EventKind::FsdJump
        )
    }
}

/// One journal line that parsed as an object carrying `event` and `timestamp`.
///
/// The raw object is kept so the event id can be derived from the exact
/// values the game wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEvent {
    raw: Value,
}

/// Parse a raw journal line. Blank lines, malformed JSON, and objects without
/// `event` or `timestamp` yield `None`.
pub fn parse_line(line: &str) -> Option<JournalEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let raw: Value = serde_json::from_str(trimmed).ok()?;
    JournalEvent::from_value(raw)
}

impl JournalEvent {
    pub fn from_value(raw: Value) -> Option<Self> {
        let obj = raw.as_object()?;
        if !obj.contains_key("event") || !obj.contains_key("timestamp") {
            return None;
        }
        Some(Self { raw })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn name(&self) -> &str {
        self.str_field("event").unwrap_or_default()
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from_name(self.name())
    }

    pub fn timestamp(&self) -> &str {
        self.str_field("timestamp").unwrap_or_default()
    }

    pub fn event_id(&self) -> String {
        generate_event_id(&self.raw)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(Value::as_str)
    }

    /// Numeric field, accepting numbers and numeric strings. Empty strings
    /// and non-finite values are treated as missing.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        let value = match self.raw.get(key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.raw.get(key).and_then(Value::as_bool)
    }

    pub fn star_system(&self) -> Option<&str> {
        self.str_field("StarSystem").filter(|s| !s.is_empty())
    }

    pub fn system_address(&self) -> Option<i64> {
        self.raw.get("SystemAddress").and_then(Value::as_i64)
    }

    pub fn body_name(&self) -> Option<&str> {
        self.str_field("BodyName").filter(|s| !s.is_empty())
    }

    pub fn body_id(&self) -> Option<i64> {
        self.raw.get("BodyID").and_then(Value::as_i64)
    }

    /// `StarPos` when it is a three-element array of finite numbers.
    pub fn star_pos(&self) -> Option<[f64; 3]> {
        let items = self.raw.get("StarPos")?.as_array()?;
        if items.len() != 3 {
            return None;
        }
        let mut pos = [0.0; 3];
        for (slot, item) in pos.iter_mut().zip(items) {
            let v = item.as_f64()?;
            if !v.is_finite() {
                return None;
            }
            *slot = v;
        }
        Some(pos)
    }

    /// Commander name from `Commander`/`LoadGame`: `Name`, else `Commander`.
    pub fn commander_name(&self) -> Option<&str> {
        self.str_field("Name")
            .filter(|s| !s.is_empty())
            .or_else(|| self.str_field("Commander").filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requires_event_and_timestamp() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   \n").is_none());
        assert!(parse_line("{not json").is_none());
        assert!(parse_line(r#"{"event":"Scan"}"#).is_none());
        assert!(parse_line(r#"{"timestamp":"t"}"#).is_none());
        assert!(parse_line(r#"[1,2,3]"#).is_none());
        let evt = parse_line(r#"{"timestamp":"t","event":"FSDJump"}"#).unwrap();
        assert_eq!(evt.kind(), EventKind::FsdJump);
        assert_eq!(evt.timestamp(), "t");
    }

    #[test]
    fn star_pos_needs_three_numbers() {
        let ok = parse_line(r#"{"timestamp":"t","event":"Location","StarPos":[1,2.5,-3]}"#).unwrap();
        assert_eq!(ok.star_pos(), Some([1.0, 2.5, -3.0]));
        let short = parse_line(r#"{"timestamp":"t","event":"Location","StarPos":[1,2]}"#).unwrap();
        assert_eq!(short.star_pos(), None);
        let text = parse_line(r#"{"timestamp":"t","event":"Location","StarPos":[1,"x",3]}"#).unwrap();
        assert_eq!(text.star_pos(), None);
    }

    #[test]
    fn commander_name_falls_back() {
        let by_name = parse_line(r#"{"timestamp":"t","event":"LoadGame","Name":"Jameson"}"#).unwrap();
        assert_eq!(by_name.commander_name(), Some("Jameson"));
        let by_cmdr =
            parse_line(r#"{"timestamp":"t","event":"Commander","Name":"","Commander":"Alt"}"#)
                .unwrap();
        assert_eq!(by_cmdr.commander_name(), Some("Alt"));
    }

    #[test]
    fn numeric_fields_accept_strings() {
        let evt = parse_line(
            r#"{"timestamp":"t","event":"Scan","SurfaceTemperature":"288.5","Radius":"","MassEM":1}"#,
        )
        .unwrap();
        assert_eq!(evt.f64_field("SurfaceTemperature"), Some(288.5));
        assert_eq!(evt.f64_field("Radius"), None);
        assert_eq!(evt.f64_field("MassEM"), Some(1.0));
        assert_eq!(evt.f64_field("Missing"), None);
    }

    #[test]
    fn seeding_kinds() {
        assert!(EventKind::LoadGame.seeds_state());
        assert!(EventKind::FsdJump.seeds_state());
        assert!(!EventKind::Scan.seeds_state());
        assert_eq!(EventKind::from_name("Music"), EventKind::Other);
    }
}
