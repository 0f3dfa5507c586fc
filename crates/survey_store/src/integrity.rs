use survey_core::{link_hash, IntegrityReport};
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::store::SurveyStore;

fn shown(hash: Option<&str>) -> &str {
    hash.unwrap_or("None")
}

impl SurveyStore {
    /// Walk the observation chain in insertion order, recomputing every
    /// link. Stops at the first broken row.
    pub fn verify_integrity(&self) -> StoreResult<IntegrityReport> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, payload_json, payload_hash, prev_hash FROM observer_notes ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut report = IntegrityReport {
            valid: true,
            ..IntegrityReport::default()
        };
        let mut expected_prev: Option<String> = None;

        for row in rows {
            let (id, payload_json, stored_hash, stored_prev) = row?;

            if stored_prev != expected_prev {
                report.errors.push(format!(
                    "Hash chain break at {id}: expected prev={}, got {}",
                    shown(expected_prev.as_deref()),
                    shown(stored_prev.as_deref()),
                ));
                break;
            }

            let computed = link_hash(stored_prev.as_deref(), &payload_json);
            if computed != stored_hash {
                report.errors.push(format!(
                    "Payload hash mismatch at {id}: stored={stored_hash}, computed={computed}"
                ));
                break;
            }

            report.checked += 1;
            report.last_good_id = Some(id);
            expected_prev = Some(stored_hash);
        }

        report.valid = report.errors.is_empty();
        if report.valid {
            debug!(checked = report.checked, "observation chain verified");
        } else {
            warn!(
                checked = report.checked,
                last_good = ?report.last_good_id,
                error = %report.errors.join("; "),
                "observation chain broken"
            );
        }
        Ok(report)
    }
}
