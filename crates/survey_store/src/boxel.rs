use rusqlite::{params, Row};
use survey_core::{now_utc_iso, BoxelEntry, RecordStatus};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::store::SurveyStore;

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<BoxelEntry> {
    let status: String = row.get(10)?;
    Ok(BoxelEntry {
        id: row.get(0)?,
        created_at_utc: row.get(1)?,
        cmdr_name: row.get(2)?,
        system_name: row.get(3)?,
        system_address: row.get(4)?,
        star_pos: [
            row.get::<_, Option<f64>>(5)?.unwrap_or_default(),
            row.get::<_, Option<f64>>(6)?.unwrap_or_default(),
            row.get::<_, Option<f64>>(7)?.unwrap_or_default(),
        ],
        boxel_highest_system: row.get(8)?,
        session_id: row.get(9)?,
        record_status: status.parse().unwrap_or_default(),
    })
}

impl SurveyStore {
    /// Record a boxel-size answer. Boxel entries sit outside the hash chain.
    pub fn save_boxel_entry(&self, entry: &mut BoxelEntry) -> StoreResult<String> {
        entry.boxel_highest_system = entry.boxel_highest_system.trim().to_string();
        if entry.boxel_highest_system.is_empty() {
            return Err(StoreError::InvalidInput("Highest system in boxel is required"));
        }
        if entry.id.is_empty() {
            entry.id = uuid::Uuid::new_v4().to_string();
        }
        entry.created_at_utc = now_utc_iso();
        entry.record_status = RecordStatus::Active;

        let [x, y, z] = entry.star_pos;
        self.lock().execute(
            "INSERT INTO boxel_entries (
                id, created_at_utc, cmdr_name, system_name, system_address,
                star_pos_x, star_pos_y, star_pos_z,
                boxel_highest_system, session_id, record_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.id,
                entry.created_at_utc,
                entry.cmdr_name,
                entry.system_name,
                entry.system_address,
                x,
                y,
                z,
                entry.boxel_highest_system,
                entry.session_id,
                entry.record_status.as_str(),
            ],
        )?;
        info!(
            system = %entry.system_name,
            highest = %entry.boxel_highest_system,
            "boxel entry saved"
        );
        Ok(entry.id.clone())
    }

    /// Active entries, oldest first. Reset entries are included on request.
    pub fn get_boxel_entries(&self, include_reset: bool) -> StoreResult<Vec<BoxelEntry>> {
        let filter = if include_reset {
            "record_status IN ('active', 'reset')"
        } else {
            "record_status = 'active'"
        };
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, created_at_utc, cmdr_name, system_name, system_address,
                    star_pos_x, star_pos_y, star_pos_z,
                    boxel_highest_system, session_id, record_status
             FROM boxel_entries WHERE {filter} ORDER BY created_at_utc"
        ))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn reset_boxel_entries(&self) -> StoreResult<usize> {
        let affected = self.lock().execute(
            "UPDATE boxel_entries SET record_status = 'reset' WHERE record_status = 'active'",
            [],
        )?;
        info!(affected, "boxel progress reset");
        Ok(affected)
    }
}
