use std::collections::{BTreeMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use survey_core::{canonical_json, link_hash, now_utc_iso, ObserverNote, RecordStatus};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::samples::assign_indexes;
use crate::store::SurveyStore;

const NOTE_COLUMNS: &str = "payload_json, payload_hash, prev_hash, record_status";

/// Select a system by its game address or, failing that, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemRef<'a> {
    Address(i64),
    Name(&'a str),
}

struct NoteRow {
    payload_json: String,
    payload_hash: String,
    prev_hash: Option<String>,
    record_status: String,
}

impl NoteRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            payload_json: row.get(0)?,
            payload_hash: row.get(1)?,
            prev_hash: row.get(2)?,
            record_status: row.get(3)?,
        })
    }

    /// The payload is frozen at write time; the column holds the live status.
    fn into_note(self) -> StoreResult<ObserverNote> {
        let mut note = ObserverNote::from_payload(&self.payload_json)?;
        if let Ok(status) = self.record_status.parse::<RecordStatus>() {
            note.record_status = status;
        }
        note.payload_hash = Some(self.payload_hash);
        note.prev_hash = self.prev_hash;
        Ok(note)
    }
}

pub(crate) fn query_notes<P: rusqlite::Params>(
    conn: &Connection,
    where_and_order: &str,
    params: P,
) -> StoreResult<Vec<ObserverNote>> {
    let sql = format!("SELECT {NOTE_COLUMNS} FROM observer_notes {where_and_order}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, NoteRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(NoteRow::into_note).collect()
}

fn load_note(conn: &Connection, id: &str) -> StoreResult<Option<ObserverNote>> {
    let sql = format!("SELECT {NOTE_COLUMNS} FROM observer_notes WHERE id = ?1");
    conn.query_row(&sql, [id], NoteRow::from_row)
        .optional()?
        .map(NoteRow::into_note)
        .transpose()
}

/// Load `id` for a mutation, requiring it to exist and still be active.
fn load_active(conn: &Connection, id: &str, action: &'static str) -> StoreResult<ObserverNote> {
    let note = load_note(conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    if note.record_status != RecordStatus::Active {
        return Err(StoreError::NotActive {
            action,
            id: id.to_string(),
        });
    }
    Ok(note)
}

fn latest_hash(conn: &Connection) -> StoreResult<Option<String>> {
    let hash = conn
        .query_row(
            "SELECT payload_hash FROM observer_notes ORDER BY seq DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash)
}

fn set_record_status(conn: &Connection, id: &str, status: RecordStatus) -> StoreResult<()> {
    conn.execute(
        "UPDATE observer_notes SET record_status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(())
}

/// Link `note` onto the head of the chain and insert it.
fn append_note(conn: &Connection, note: &mut ObserverNote) -> StoreResult<()> {
    if note.id.is_empty() {
        note.id = uuid::Uuid::new_v4().to_string();
    }
    note.created_at_utc = now_utc_iso();

    let payload_json = canonical_json(&note.payload()?);
    let prev_hash = latest_hash(conn)?;
    let payload_hash = link_hash(prev_hash.as_deref(), &payload_json);

    conn.execute(
        "INSERT INTO observer_notes (
            id, created_at_utc, event_id, timestamp_utc, system_address, system_name,
            z_bin, session_id, slice_status, completeness_confidence, sampling_method,
            system_count, corrected_n, max_distance, sample_index, system_index,
            survey_type, boxel_highest_system, supersedes_id, record_status,
            schema_version, payload_json, payload_hash, prev_hash
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
            ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
        )",
        params![
            note.id,
            note.created_at_utc,
            note.event_id,
            note.timestamp_utc,
            note.system_address,
            note.system_name,
            note.z_bin,
            note.session_id,
            note.slice_status.as_str(),
            note.completeness_confidence,
            note.sampling_method.as_str(),
            note.system_count,
            note.corrected_n,
            note.max_distance,
            note.sample_index,
            note.system_index,
            note.survey_type.as_str(),
            note.boxel_highest_system,
            note.supersedes_id,
            note.record_status.as_str(),
            note.schema_version,
            payload_json,
            payload_hash,
            prev_hash,
        ],
    )?;

    note.prev_hash = prev_hash;
    note.payload_hash = Some(payload_hash);
    Ok(())
}

fn count_grouped(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> StoreResult<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare(sql)?;
    let counts = stmt
        .query_map(params, |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<BTreeMap<String, i64>>>()?;
    Ok(counts)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

impl SurveyStore {
    /// Validate and append a new observation. Sample and system indexes are
    /// assigned here unless the note already carries them.
    pub fn save_note(&self, note: &mut ObserverNote) -> StoreResult<String> {
        note.validate()?;

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        assign_indexes(&tx, note)?;
        append_note(&tx, note)?;
        tx.commit()?;

        debug!(
            id = %note.id,
            z_bin = note.z_bin,
            sample = ?note.sample_index,
            system = ?note.system_index,
            status = %note.slice_status,
            "observation saved"
        );
        Ok(note.id.clone())
    }

    /// Replace an active note with `amended`. The original stays in the
    /// chain marked `amended`; the new row points back at it and keeps its
    /// place in the sample.
    pub fn amend_note(&self, original_id: &str, amended: &mut ObserverNote) -> StoreResult<String> {
        amended.validate()?;

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let original = load_active(&tx, original_id, "amend")?;

        if amended.id.is_empty() || amended.id == original.id {
            amended.id = uuid::Uuid::new_v4().to_string();
        }
        amended.sample_index = original.sample_index;
        amended.system_index = original.system_index;
        amended.supersedes_id = Some(original.id.clone());
        amended.record_status = RecordStatus::Active;

        set_record_status(&tx, &original.id, RecordStatus::Amended)?;
        append_note(&tx, amended)?;
        tx.commit()?;

        info!(original = %original_id, amended = %amended.id, "observation amended");
        Ok(amended.id.clone())
    }

    /// Withdraw an active note. Appends a `deleted` marker that supersedes
    /// it and returns the marker's id.
    pub fn delete_note(&self, id: &str, reason: &str) -> StoreResult<String> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(StoreError::InvalidInput("Deletion reason is required"));
        }

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let original = load_active(&tx, id, "delete")?;

        let mut marker = ObserverNote::deletion_of(&original, reason);
        set_record_status(&tx, id, RecordStatus::Deleted)?;
        append_note(&tx, &mut marker)?;
        tx.commit()?;

        info!(original = %id, marker = %marker.id, reason, "observation deleted");
        Ok(marker.id)
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

impl SurveyStore {
    pub fn get_note(&self, id: &str) -> StoreResult<Option<ObserverNote>> {
        load_note(&self.lock(), id)
    }

    pub fn get_by_event_id(
        &self,
        event_id: &str,
        include_inactive: bool,
    ) -> StoreResult<Vec<ObserverNote>> {
        let conn = self.lock();
        if include_inactive {
            query_notes(&conn, "WHERE event_id = ?1 ORDER BY seq", [event_id])
        } else {
            query_notes(
                &conn,
                "WHERE event_id = ?1 AND record_status = 'active' ORDER BY seq",
                [event_id],
            )
        }
    }

    /// Newest active notes first, one page at a time.
    pub fn get_active(&self, limit: usize, offset: usize) -> StoreResult<Vec<ObserverNote>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        query_notes(
            &self.lock(),
            "WHERE record_status = 'active' ORDER BY seq DESC LIMIT ?1 OFFSET ?2",
            params![limit, offset],
        )
    }

    /// Every active note in chain order.
    pub fn get_all_active(&self) -> StoreResult<Vec<ObserverNote>> {
        query_notes(
            &self.lock(),
            "WHERE record_status = 'active' ORDER BY seq",
            [],
        )
    }

    /// Every row ever written, in chain order.
    pub fn get_all_notes(&self) -> StoreResult<Vec<ObserverNote>> {
        query_notes(&self.lock(), "ORDER BY seq", [])
    }

    pub fn get_by_z_bin(&self, z_bin: i64, active_only: bool) -> StoreResult<Vec<ObserverNote>> {
        let conn = self.lock();
        if active_only {
            query_notes(
                &conn,
                "WHERE z_bin = ?1 AND record_status = 'active' ORDER BY seq DESC",
                [z_bin],
            )
        } else {
            query_notes(&conn, "WHERE z_bin = ?1 ORDER BY seq DESC", [z_bin])
        }
    }

    pub fn get_by_session(
        &self,
        session_id: &str,
        active_only: bool,
    ) -> StoreResult<Vec<ObserverNote>> {
        let conn = self.lock();
        if active_only {
            query_notes(
                &conn,
                "WHERE session_id = ?1 AND record_status = 'active' ORDER BY seq",
                [session_id],
            )
        } else {
            query_notes(&conn, "WHERE session_id = ?1 ORDER BY seq", [session_id])
        }
    }

    pub fn get_by_system(
        &self,
        system: SystemRef<'_>,
        active_only: bool,
    ) -> StoreResult<Vec<ObserverNote>> {
        let conn = self.lock();
        let status = if active_only {
            " AND record_status = 'active'"
        } else {
            ""
        };
        match system {
            SystemRef::Address(address) => query_notes(
                &conn,
                &format!("WHERE system_address = ?1{status} ORDER BY seq DESC"),
                [address],
            ),
            SystemRef::Name(name) => query_notes(
                &conn,
                &format!("WHERE system_name = ?1{status} ORDER BY seq DESC"),
                [name],
            ),
        }
    }

    /// Every version of the note `id` belongs to, oldest first: walk back
    /// along `supersedes_id` to the root, then forward through its
    /// successors.
    pub fn get_amendment_history(&self, id: &str) -> StoreResult<Vec<ObserverNote>> {
        let conn = self.lock();
        let mut seen = HashSet::new();

        let mut root = id.to_string();
        while seen.insert(root.clone()) {
            let parent: Option<Option<String>> = conn
                .query_row(
                    "SELECT supersedes_id FROM observer_notes WHERE id = ?1",
                    [&root],
                    |row| row.get(0),
                )
                .optional()?;
            match parent.flatten() {
                Some(parent) => root = parent,
                None => break,
            }
        }

        let mut history = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(root);
        while let Some(note_id) = current.take() {
            if !visited.insert(note_id.clone()) {
                break;
            }
            if let Some(note) = load_note(&conn, &note_id)? {
                history.push(note);
            }
            current = conn
                .query_row(
                    "SELECT id FROM observer_notes WHERE supersedes_id = ?1 ORDER BY seq LIMIT 1",
                    [&note_id],
                    |row| row.get(0),
                )
                .optional()?;
        }
        Ok(history)
    }

    /// Row counts per record status, across every row.
    pub fn count_by_status(&self) -> StoreResult<BTreeMap<String, i64>> {
        count_grouped(
            &self.lock(),
            "SELECT record_status, COUNT(*) FROM observer_notes GROUP BY record_status",
            [],
        )
    }

    pub fn count_by_slice_status(&self, active_only: bool) -> StoreResult<BTreeMap<String, i64>> {
        let conn = self.lock();
        if active_only {
            count_grouped(
                &conn,
                "SELECT slice_status, COUNT(*) FROM observer_notes
                 WHERE record_status = 'active' GROUP BY slice_status",
                [],
            )
        } else {
            count_grouped(
                &conn,
                "SELECT slice_status, COUNT(*) FROM observer_notes GROUP BY slice_status",
                [],
            )
        }
    }
}
