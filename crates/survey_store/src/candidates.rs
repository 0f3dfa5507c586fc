//! Journal-derived facts: candidate bodies, play sessions and per-CMDR
//! tallies. None of this is part of the observation chain.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use serde_json::json;
use survey_core::rating::ELW_CANDIDATE_TYPE;
use survey_core::{generate_event_id, CandidateRecord, Z_BIN_SIZE};
use tracing::debug;

use crate::error::StoreResult;
use crate::store::SurveyStore;

const CANDIDATE_COLUMNS: &str = "
    c.timestamp_utc, c.event, c.event_id, c.cmdr_name, c.session_id,
    c.star_system, c.system_address, c.body_name, c.body_id,
    c.candidate_type, c.planet_class, c.terraform_state, c.atmosphere, c.volcanism,
    c.landable, c.tidal_lock, c.was_discovered, c.was_mapped,
    c.distance_from_arrival_ls, c.surface_temp_k, c.surface_gravity_g,
    c.surface_pressure_atm, c.mass_em, c.radius_km, c.rotation_period_days,
    c.orbital_period_days, c.semi_major_axis_au, c.orbital_eccentricity, c.axial_tilt_deg,
    c.earth2_rating, c.similarity_score, c.goldilocks_score, c.goldilocks_category,
    c.worth_landing, c.worth_reason, c.distance_from_sol_ly,
    c.star_pos_x, c.star_pos_y, c.star_pos_z";

const CANDIDATE_COLUMN_COUNT: usize = 39;

/// Per-CMDR tallies bumped each time a new candidate is logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommanderStats {
    pub cmdr_name: String,
    pub total_all: i64,
    pub total_elw: i64,
    pub total_terraformable: i64,
    pub total_earth_twin: i64,
    pub total_excellent: i64,
    pub total_very_good: i64,
    pub total_good: i64,
    pub total_fair: i64,
    pub total_marginal: i64,
    pub total_poor: i64,
    pub total_unknown: i64,
    pub last_updated: Option<String>,
}

/// Narrow [`SurveyStore::candidates_with_observations`]. Empty means all.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    /// Candidates within half a bin of this height on the survey axis.
    pub z_bin: Option<i64>,
    /// Bin width for `z_bin`, normally `monitoring.z_bin_size`.
    /// Falls back to [`Z_BIN_SIZE`] when unset or not positive.
    pub z_bin_size: Option<i64>,
    pub session_id: Option<String>,
    pub cmdr_name: Option<String>,
}

/// A candidate plus the active observation taken at the same event, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateObservation {
    #[serde(flatten)]
    pub candidate: CandidateRecord,
    pub obs_slice_status: Option<String>,
    pub obs_confidence: Option<i64>,
    pub obs_system_count: Option<i64>,
    pub obs_corrected_n: Option<i64>,
    pub obs_max_distance: Option<f64>,
    pub obs_payload_json: Option<String>,
}

fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn candidate_from_row(row: &Row<'_>) -> rusqlite::Result<CandidateRecord> {
    Ok(CandidateRecord {
        timestamp_utc: text(row, 0)?,
        event: text(row, 1)?,
        event_id: text(row, 2)?,
        cmdr_name: text(row, 3)?,
        session_id: text(row, 4)?,
        star_system: text(row, 5)?,
        system_address: row.get(6)?,
        body_name: text(row, 7)?,
        body_id: row.get(8)?,
        candidate_type: text(row, 9)?,
        planet_class: text(row, 10)?,
        terraform_state: text(row, 11)?,
        atmosphere: text(row, 12)?,
        volcanism: text(row, 13)?,
        landable: row.get(14)?,
        tidal_lock: row.get(15)?,
        was_discovered: row.get(16)?,
        was_mapped: row.get(17)?,
        distance_from_arrival_ls: row.get(18)?,
        surface_temp_k: row.get(19)?,
        surface_gravity_g: row.get(20)?,
        surface_pressure_atm: row.get(21)?,
        mass_em: row.get(22)?,
        radius_km: row.get(23)?,
        rotation_period_days: row.get(24)?,
        orbital_period_days: row.get(25)?,
        semi_major_axis_au: row.get(26)?,
        orbital_eccentricity: row.get(27)?,
        axial_tilt_deg: row.get(28)?,
        earth2_rating: text(row, 29)?,
        similarity_score: row.get::<_, Option<f64>>(30)?.unwrap_or(-1.0),
        goldilocks_score: row.get::<_, Option<i64>>(31)?.unwrap_or_default(),
        goldilocks_category: text(row, 32)?,
        worth_landing: text(row, 33)?,
        worth_reason: text(row, 34)?,
        distance_from_sol_ly: row.get::<_, Option<f64>>(35)?.unwrap_or_default(),
        star_pos: [
            row.get::<_, Option<f64>>(36)?.unwrap_or_default(),
            row.get::<_, Option<f64>>(37)?.unwrap_or_default(),
            row.get::<_, Option<f64>>(38)?.unwrap_or_default(),
        ],
    })
}

fn stats_from_row(row: &Row<'_>) -> rusqlite::Result<CommanderStats> {
    Ok(CommanderStats {
        cmdr_name: row.get(0)?,
        total_all: row.get(1)?,
        total_elw: row.get(2)?,
        total_terraformable: row.get(3)?,
        total_earth_twin: row.get(4)?,
        total_excellent: row.get(5)?,
        total_very_good: row.get(6)?,
        total_good: row.get(7)?,
        total_fair: row.get(8)?,
        total_marginal: row.get(9)?,
        total_poor: row.get(10)?,
        total_unknown: row.get(11)?,
        last_updated: row.get(12)?,
    })
}

const STATS_COLUMNS: &str = "cmdr_name, total_all, total_elw, total_terraformable,
    total_earth_twin, total_excellent, total_very_good, total_good, total_fair,
    total_marginal, total_poor, total_unknown, last_updated";

/// Counter column for a rating category; anything unrecognised is unknown.
fn rating_column(rating: &str) -> &'static str {
    match rating {
        "Earth Twin" => "total_earth_twin",
        "Excellent" => "total_excellent",
        "Very Good" => "total_very_good",
        "Good" => "total_good",
        "Fair" => "total_fair",
        "Marginal" => "total_marginal",
        "Poor" => "total_poor",
        _ => "total_unknown",
    }
}

fn bump_commander_stats(conn: &Connection, candidate: &CandidateRecord) -> StoreResult<()> {
    let cmdr = candidate.cmdr_name.as_str();
    if cmdr.is_empty() {
        return Ok(());
    }
    conn.execute(
        "INSERT OR IGNORE INTO commander_stats (cmdr_name) VALUES (?1)",
        [cmdr],
    )?;
    conn.execute(
        "UPDATE commander_stats
         SET total_all = total_all + 1, last_updated = CURRENT_TIMESTAMP
         WHERE cmdr_name = ?1",
        [cmdr],
    )?;

    let kind_column = if candidate.candidate_type.contains(ELW_CANDIDATE_TYPE) {
        Some("total_elw")
    } else if candidate.candidate_type.contains("Terraformable") {
        Some("total_terraformable")
    } else {
        None
    };
    for column in kind_column
        .into_iter()
        .chain([rating_column(&candidate.earth2_rating)])
    {
        conn.execute(
            &format!("UPDATE commander_stats SET {column} = {column} + 1 WHERE cmdr_name = ?1"),
            [cmdr],
        )?;
    }
    Ok(())
}

/// Event id for a candidate that arrived without one, from the same four
/// fields the journal side hashes.
fn fallback_event_id(candidate: &CandidateRecord) -> String {
    generate_event_id(&json!({
        "timestamp": candidate.timestamp_utc,
        "event": candidate.event,
        "SystemAddress": candidate.system_address,
        "BodyID": candidate.body_id,
    }))
}

impl SurveyStore {
    /// Insert a candidate and bump its CMDR's tallies. Returns `false` when
    /// the same body was already logged for that CMDR.
    pub fn log_candidate(&self, candidate: &CandidateRecord) -> StoreResult<bool> {
        let event_id = if candidate.event_id.is_empty() {
            fallback_event_id(candidate)
        } else {
            candidate.event_id.clone()
        };
        let [x, y, z] = candidate.star_pos;

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT INTO candidates (
                timestamp_utc, event, event_id, cmdr_name, session_id,
                star_system, system_address, body_name, body_id,
                candidate_type, planet_class, terraform_state, atmosphere, volcanism,
                landable, tidal_lock, was_discovered, was_mapped,
                distance_from_arrival_ls, surface_temp_k, surface_gravity_g,
                surface_pressure_atm, mass_em, radius_km, rotation_period_days,
                orbital_period_days, semi_major_axis_au, orbital_eccentricity, axial_tilt_deg,
                earth2_rating, similarity_score, goldilocks_score, goldilocks_category,
                worth_landing, worth_reason, distance_from_sol_ly,
                star_pos_x, star_pos_y, star_pos_z
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39
            )
            ON CONFLICT(star_system, body_name, cmdr_name) DO NOTHING",
            params![
                candidate.timestamp_utc,
                candidate.event,
                event_id,
                candidate.cmdr_name,
                candidate.session_id,
                candidate.star_system,
                candidate.system_address,
                candidate.body_name,
                candidate.body_id,
                candidate.candidate_type,
                candidate.planet_class,
                candidate.terraform_state,
                candidate.atmosphere,
                candidate.volcanism,
                candidate.landable,
                candidate.tidal_lock,
                candidate.was_discovered,
                candidate.was_mapped,
                candidate.distance_from_arrival_ls,
                candidate.surface_temp_k,
                candidate.surface_gravity_g,
                candidate.surface_pressure_atm,
                candidate.mass_em,
                candidate.radius_km,
                candidate.rotation_period_days,
                candidate.orbital_period_days,
                candidate.semi_major_axis_au,
                candidate.orbital_eccentricity,
                candidate.axial_tilt_deg,
                candidate.earth2_rating,
                candidate.similarity_score,
                candidate.goldilocks_score,
                candidate.goldilocks_category,
                candidate.worth_landing,
                candidate.worth_reason,
                candidate.distance_from_sol_ly,
                x,
                y,
                z,
            ],
        )?;
        if inserted == 0 {
            return Ok(false);
        }
        bump_commander_stats(&tx, candidate)?;
        tx.commit()?;

        debug!(
            body = %candidate.body_name,
            kind = %candidate.candidate_type,
            rating = %candidate.earth2_rating,
            "candidate logged"
        );
        Ok(true)
    }

    /// Candidates, newest first, each joined with the active observation
    /// sharing its event id.
    pub fn candidates_with_observations(
        &self,
        filter: &CandidateFilter,
    ) -> StoreResult<Vec<CandidateObservation>> {
        let mut clauses = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();
        if let Some(z_bin) = filter.z_bin {
            let bin_size = filter.z_bin_size.filter(|size| *size > 0).unwrap_or(Z_BIN_SIZE);
            let half = bin_size as f64 / 2.0;
            clauses.push("c.star_pos_y BETWEEN ? AND ?");
            values.push(SqlValue::Real(z_bin as f64 - half));
            values.push(SqlValue::Real(z_bin as f64 + half));
        }
        if let Some(session_id) = filter.session_id.as_ref().filter(|s| !s.is_empty()) {
            clauses.push("c.session_id = ?");
            values.push(SqlValue::Text(session_id.clone()));
        }
        if let Some(cmdr) = filter.cmdr_name.as_ref().filter(|s| !s.is_empty()) {
            clauses.push("c.cmdr_name = ?");
            values.push(SqlValue::Text(cmdr.clone()));
        }
        let where_clause = if clauses.is_empty() {
            "1=1".to_string()
        } else {
            clauses.join(" AND ")
        };

        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CANDIDATE_COLUMNS},
                    o.slice_status, o.completeness_confidence, o.system_count,
                    o.corrected_n, o.max_distance, o.payload_json
             FROM candidates c
             LEFT JOIN observer_notes o
               ON c.event_id = o.event_id AND o.record_status = 'active'
             WHERE {where_clause}
             ORDER BY c.timestamp_utc DESC"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let n = CANDIDATE_COLUMN_COUNT;
                Ok(CandidateObservation {
                    candidate: candidate_from_row(row)?,
                    obs_slice_status: row.get(n)?,
                    obs_confidence: row.get(n + 1)?,
                    obs_system_count: row.get(n + 2)?,
                    obs_corrected_n: row.get(n + 3)?,
                    obs_max_distance: row.get(n + 4)?,
                    obs_payload_json: row.get(n + 5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Open a play session and return its id, `{cmdr}_{unix seconds}`.
    pub fn start_session(&self, cmdr_name: &str, journal_file: &str) -> StoreResult<String> {
        let now = chrono::Utc::now();
        let session_id = format!("{cmdr_name}_{}", now.timestamp());
        self.lock().execute(
            "INSERT OR IGNORE INTO sessions (session_id, cmdr_name, journal_file, start_time)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, cmdr_name, journal_file, now.to_rfc3339()],
        )?;
        debug!(session = %session_id, journal = journal_file, "session started");
        Ok(session_id)
    }

    pub fn end_session(&self, session_id: &str) -> StoreResult<()> {
        self.lock().execute(
            "UPDATE sessions SET end_time = ?1 WHERE session_id = ?2",
            params![chrono::Utc::now().to_rfc3339(), session_id],
        )?;
        debug!(session = %session_id, "session ended");
        Ok(())
    }

    /// `(start_time, end_time)` of a session, if it exists.
    pub fn session_times(&self, session_id: &str) -> StoreResult<Option<(String, Option<String>)>> {
        let times = self
            .lock()
            .query_row(
                "SELECT start_time, end_time FROM sessions WHERE session_id = ?1",
                [session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(times)
    }

    pub fn get_cmdr_stats(&self, cmdr_name: &str) -> StoreResult<Option<CommanderStats>> {
        let stats = self
            .lock()
            .query_row(
                &format!("SELECT {STATS_COLUMNS} FROM commander_stats WHERE cmdr_name = ?1"),
                [cmdr_name],
                stats_from_row,
            )
            .optional()?;
        Ok(stats)
    }

    /// Every CMDR's tallies, most prolific first.
    pub fn get_all_cmdr_stats(&self) -> StoreResult<Vec<CommanderStats>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STATS_COLUMNS} FROM commander_stats ORDER BY total_all DESC, cmdr_name"
        ))?;
        let stats = stmt
            .query_map([], stats_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(body: &str, kind: &str, rating: &str) -> CandidateRecord {
        CandidateRecord {
            timestamp_utc: "3310-05-01T10:06:00Z".to_string(),
            event: "Scan".to_string(),
            cmdr_name: "Jameson".to_string(),
            session_id: "Jameson_1".to_string(),
            star_system: "Plio Eurl AA-A h3".to_string(),
            system_address: Some(1),
            body_name: body.to_string(),
            body_id: Some(4),
            candidate_type: kind.to_string(),
            earth2_rating: rating.to_string(),
            star_pos: [12.0, 96.0, 40.0],
            ..CandidateRecord::default()
        }
    }

    #[test]
    fn duplicate_bodies_are_not_counted_twice() {
        let store = SurveyStore::open_in_memory().unwrap();
        let elw = candidate("Plio Eurl AA-A h3 1", "ELW", "Excellent");
        assert!(store.log_candidate(&elw).unwrap());
        assert!(!store.log_candidate(&elw).unwrap());
        assert!(store
            .log_candidate(&candidate(
                "Plio Eurl AA-A h3 2",
                "Water world - Terraformable",
                "Nonsense"
            ))
            .unwrap());

        let stats = store.get_cmdr_stats("Jameson").unwrap().unwrap();
        assert_eq!(stats.total_all, 2);
        assert_eq!(stats.total_elw, 1);
        assert_eq!(stats.total_terraformable, 1);
        assert_eq!(stats.total_excellent, 1);
        assert_eq!(stats.total_unknown, 1);
        assert_eq!(store.get_all_cmdr_stats().unwrap().len(), 1);
        assert!(store.get_cmdr_stats("Nobody").unwrap().is_none());
    }

    #[test]
    fn missing_event_id_is_derived() {
        let store = SurveyStore::open_in_memory().unwrap();
        let record = candidate("Plio Eurl AA-A h3 1", "ELW", "Good");
        store.log_candidate(&record).unwrap();
        let rows = store
            .candidates_with_observations(&CandidateFilter::default())
            .unwrap();
        let expected = generate_event_id(&json!({
            "timestamp": "3310-05-01T10:06:00Z",
            "event": "Scan",
            "SystemAddress": 1,
            "BodyID": 4,
        }));
        assert_eq!(rows[0].candidate.event_id, expected);
        assert!(rows[0].obs_slice_status.is_none());
    }

    #[test]
    fn z_bin_filter_uses_configured_bin_size() {
        let store = SurveyStore::open_in_memory().unwrap();
        let mut near = candidate("Plio Eurl AA-A h3 1", "ELW", "Good");
        near.star_pos = [0.0, 140.0, 0.0];
        let mut far = candidate("Plio Eurl AA-A h3 2", "ELW", "Good");
        far.star_pos = [0.0, 190.0, 0.0];
        store.log_candidate(&near).unwrap();
        store.log_candidate(&far).unwrap();

        let default_width = CandidateFilter {
            z_bin: Some(100),
            ..CandidateFilter::default()
        };
        assert!(store.candidates_with_observations(&default_width).unwrap().is_empty());

        let wide = CandidateFilter {
            z_bin: Some(100),
            z_bin_size: Some(100),
            ..CandidateFilter::default()
        };
        let rows = store.candidates_with_observations(&wide).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].candidate.body_name, "Plio Eurl AA-A h3 1");

        let wider = CandidateFilter {
            z_bin_size: Some(200),
            ..wide
        };
        assert_eq!(store.candidates_with_observations(&wider).unwrap().len(), 2);
    }

    #[test]
    fn sessions_open_and_close() {
        let store = SurveyStore::open_in_memory().unwrap();
        let id = store.start_session("Jameson", "Journal.2024-05-01T100000.01.log").unwrap();
        assert!(id.starts_with("Jameson_"));
        let (_, end) = store.session_times(&id).unwrap().unwrap();
        assert!(end.is_none());
        store.end_session(&id).unwrap();
        let (_, end) = store.session_times(&id).unwrap().unwrap();
        assert!(end.is_some());
    }
}
