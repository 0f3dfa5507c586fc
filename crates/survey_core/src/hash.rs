use serde_json::Value;
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compact JSON with object keys sorted at every depth.
///
/// Independent of serde_json's map ordering feature, so the bytes that get
/// hashed are stable no matter how the workspace is built.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Link hash for one observation row: `sha256(prev_hash || canonical(payload))`.
///
/// The first row in the chain has no predecessor and hashes the payload alone.
pub fn chain_hash(prev_hash: Option<&str>, payload: &Value) -> String {
    link_hash(prev_hash, &canonical_json(payload))
}

/// [`chain_hash`] over payload text that is already canonical, as stored.
pub fn link_hash(prev_hash: Option<&str>, canonical_payload: &str) -> String {
    let mut material = prev_hash.unwrap_or_default().to_string();
    material.push_str(canonical_payload);
    sha256_hex(material.as_bytes())
}

/// Deterministic 16-hex-char id for a journal event, built from
/// `timestamp|event|SystemAddress|BodyID`. Missing parts become empty strings.
///
/// Candidates and observations computed from the same event share this id,
/// which is what joins them later.
pub fn generate_event_id(event: &Value) -> String {
    let part = |key: &str| match event.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let joined = [
        part("timestamp"),
        part("event"),
        part("SystemAddress"),
        part("BodyID"),
    ]
    .join("|");
    let mut digest = sha256_hex(joined.as_bytes());
    digest.truncate(16);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [3, {"y": true, "x": null}], "c": "s"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"s","z":[3,{"x":null,"y":true}]},"b":1}"#
        );
    }

    #[test]
    fn chain_hash_depends_on_predecessor() {
        let payload = json!({"system_name": "Sol"});
        let first = chain_hash(None, &payload);
        assert_eq!(first, sha256_hex(br#"{"system_name":"Sol"}"#));
        assert_ne!(chain_hash(Some(&first), &payload), first);
        assert_eq!(
            link_hash(Some(&first), &canonical_json(&payload)),
            chain_hash(Some(&first), &payload)
        );
    }

    #[test]
    fn event_id_uses_four_fields() {
        let event = json!({
            "timestamp": "3310-01-01T00:00:00Z",
            "event": "Scan",
            "SystemAddress": 10477373803_i64,
            "BodyID": 3,
            "BodyName": "ignored"
        });
        let expected = &sha256_hex(b"3310-01-01T00:00:00Z|Scan|10477373803|3")[..16];
        assert_eq!(generate_event_id(&event), expected);
    }

    #[test]
    fn event_id_with_missing_fields() {
        let event = json!({"timestamp": "t", "event": "FSDJump"});
        let expected = &sha256_hex(b"t|FSDJump||")[..16];
        assert_eq!(generate_event_id(&event), expected);
        assert_eq!(generate_event_id(&event).len(), 16);
    }
}
