//! Sample and system numbering for density surveys.
//!
//! A sample is a run of observations at one z-bin for one survey type. It
//! stays open while it has `in_progress` rows and no `complete` row; the
//! first save after it completes starts the next sample. Numbering spans
//! every session so progress survives restarts.

use rusqlite::{params, Connection};
use survey_core::{ObserverNote, SampleCounts, SurveyType};
use tracing::info;

use crate::error::StoreResult;
use crate::store::SurveyStore;

/// Highest open sample index for the bin, if any sample is still open.
fn open_sample_index(
    conn: &Connection,
    z_bin: i64,
    survey_type: SurveyType,
) -> StoreResult<Option<i64>> {
    let index = conn.query_row(
        "SELECT MAX(n.sample_index) FROM observer_notes n
         WHERE n.z_bin = ?1
           AND (n.survey_type = ?2 OR n.survey_type IS NULL)
           AND n.record_status = 'active'
           AND n.slice_status = 'in_progress'
           AND n.sample_index IS NOT NULL
           AND NOT EXISTS (
               SELECT 1 FROM observer_notes c
               WHERE c.z_bin = n.z_bin
                 AND c.sample_index = n.sample_index
                 AND (c.survey_type = ?2 OR c.survey_type IS NULL)
                 AND c.record_status = 'active'
                 AND c.slice_status = 'complete'
           )",
        params![z_bin, survey_type.as_str()],
        |row| row.get(0),
    )?;
    Ok(index)
}

/// Distinct `(session, sample)` pairs that hold a `complete` row.
fn completed_samples(conn: &Connection, z_bin: i64, survey_type: SurveyType) -> StoreResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(DISTINCT session_id || '-' || sample_index) FROM observer_notes
         WHERE z_bin = ?1
           AND (survey_type = ?2 OR survey_type IS NULL)
           AND record_status = 'active'
           AND slice_status = 'complete'",
        params![z_bin, survey_type.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// The sample a new observation at this bin belongs to.
pub(crate) fn current_sample_index(
    conn: &Connection,
    z_bin: i64,
    survey_type: SurveyType,
) -> StoreResult<i64> {
    match open_sample_index(conn, z_bin, survey_type)? {
        Some(index) => Ok(index),
        None => Ok(completed_samples(conn, z_bin, survey_type)? + 1),
    }
}

pub(crate) fn next_system_index(
    conn: &Connection,
    z_bin: i64,
    sample_index: i64,
    survey_type: SurveyType,
) -> StoreResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(system_index), 0) + 1 FROM observer_notes
         WHERE z_bin = ?1
           AND sample_index = ?2
           AND (survey_type = ?3 OR survey_type IS NULL)
           AND record_status = 'active'",
        params![z_bin, sample_index, survey_type.as_str()],
        |row| row.get(0),
    )?;
    Ok(next)
}

/// Fill in whichever of `sample_index`/`system_index` the note lacks.
pub(crate) fn assign_indexes(conn: &Connection, note: &mut ObserverNote) -> StoreResult<()> {
    let sample_index = match note.sample_index {
        Some(index) => index,
        None => current_sample_index(conn, note.z_bin, note.survey_type)?,
    };
    note.sample_index = Some(sample_index);
    if note.system_index.is_none() {
        note.system_index = Some(next_system_index(
            conn,
            note.z_bin,
            sample_index,
            note.survey_type,
        )?);
    }
    Ok(())
}

impl SurveyStore {
    /// Progress at one bin: the sample a save would land in, how many
    /// systems that sample already holds, and how many samples completed.
    pub fn sample_counts(&self, z_bin: i64, survey_type: SurveyType) -> StoreResult<SampleCounts> {
        let conn = self.lock();
        let total_samples = completed_samples(&conn, z_bin, survey_type)?;
        let Some(open) = open_sample_index(&conn, z_bin, survey_type)? else {
            return Ok(SampleCounts {
                current_sample: total_samples + 1,
                current_systems: 0,
                total_samples,
            });
        };
        let current_systems = conn.query_row(
            "SELECT COUNT(*) FROM observer_notes
             WHERE z_bin = ?1
               AND sample_index = ?2
               AND (survey_type = ?3 OR survey_type IS NULL)
               AND record_status = 'active'
               AND slice_status = 'in_progress'",
            params![z_bin, open, survey_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(SampleCounts {
            current_sample: open,
            current_systems,
            total_samples,
        })
    }

    /// Retire the active observations at one bin so its numbering starts over.
    pub fn reset_sample_progress(&self, z_bin: i64, survey_type: SurveyType) -> StoreResult<usize> {
        let affected = self.lock().execute(
            "UPDATE observer_notes SET record_status = 'reset'
             WHERE record_status = 'active'
               AND z_bin = ?1
               AND (survey_type = ?2 OR survey_type IS NULL)",
            params![z_bin, survey_type.as_str()],
        )?;
        info!(z_bin, survey_type = %survey_type, affected, "sample progress reset");
        Ok(affected)
    }

    /// Retire every active observation, or only those of one survey type.
    pub fn reset_all_progress(&self, survey_type: Option<SurveyType>) -> StoreResult<usize> {
        let conn = self.lock();
        let affected = match survey_type {
            Some(survey_type) => conn.execute(
                "UPDATE observer_notes SET record_status = 'reset'
                 WHERE record_status = 'active'
                   AND (survey_type = ?1 OR survey_type IS NULL)",
                [survey_type.as_str()],
            )?,
            None => conn.execute(
                "UPDATE observer_notes SET record_status = 'reset'
                 WHERE record_status = 'active'",
                [],
            )?,
        };
        info!(affected, "all survey progress reset");
        Ok(affected)
    }
}
