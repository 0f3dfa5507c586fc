//! Flat CSV exports: the boxel sheet, the survey spreadsheet and the raw
//! audit dump.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use survey_core::{BoxelEntry, ObserverNote, RecordStatus};
use tracing::info;

use crate::atomic::write_atomic;
use crate::density::{file_timestamp, safe_file_component};
use crate::error::ExportResult;

pub const BOXEL_HEADER: [&str; 4] = [
    "Timestamp",
    "Commander Name",
    "Highest System in Boxel",
    "Column 3",
];

pub const SPREADSHEET_HEADER: [&str; 12] = [
    "System",
    "Z Sample",
    "System Count",
    "Corrected n",
    "Max Distance",
    "X",
    "Y",
    "Z",
    "Slice Status",
    "Confidence",
    "Method",
    "Notes",
];

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Boxel sheet
// ---------------------------------------------------------------------------

struct BoxelRow {
    timestamp: String,
    cmdr_name: String,
    highest_system: String,
}

fn boxel_rows(notes: &[ObserverNote], entries: &[BoxelEntry], cmdr_name: &str) -> Vec<BoxelRow> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for note in notes {
        let Some(highest) = note.boxel_highest_system.as_deref().map(str::trim) else {
            continue;
        };
        if note.record_status != RecordStatus::Active || highest.is_empty() {
            continue;
        }
        if seen.insert(note.id.clone()) {
            rows.push(BoxelRow {
                timestamp: note.timestamp_utc.clone(),
                cmdr_name: cmdr_name.to_string(),
                highest_system: highest.to_string(),
            });
        }
    }
    for entry in entries {
        let highest = entry.boxel_highest_system.trim();
        if entry.record_status != RecordStatus::Active || highest.is_empty() {
            continue;
        }
        if seen.insert(entry.id.clone()) {
            let cmdr = if entry.cmdr_name.is_empty() {
                cmdr_name
            } else {
                &entry.cmdr_name
            };
            rows.push(BoxelRow {
                timestamp: entry.created_at_utc.clone(),
                cmdr_name: cmdr.to_string(),
                highest_system: highest.to_string(),
            });
        }
    }
    rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    rows
}

/// Boxel answers from both notes and boxel entries. `None` when there is
/// nothing to export.
pub fn export_boxel_sheet(
    notes: &[ObserverNote],
    entries: &[BoxelEntry],
    cmdr_name: &str,
    output_dir: &Path,
) -> ExportResult<Option<PathBuf>> {
    let rows = boxel_rows(notes, entries, cmdr_name);
    if rows.is_empty() {
        return Ok(None);
    }
    let path = output_dir.join(format!(
        "DW3_Stellar_Properties_Boxels_{}_{}.csv",
        safe_file_component(cmdr_name),
        file_timestamp()
    ));
    write_atomic(&path, |out| {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(BOXEL_HEADER)?;
        for row in &rows {
            writer.write_record([
                row.timestamp.as_str(),
                row.cmdr_name.as_str(),
                row.highest_system.as_str(),
                "",
            ])?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    })?;
    info!(path = %path.display(), rows = rows.len(), "boxel sheet written");
    Ok(Some(path))
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

/// Active notes in the column order of the shared survey spreadsheet.
/// Returns how many rows were written.
pub fn export_spreadsheet_csv(notes: &[ObserverNote], path: &Path) -> ExportResult<usize> {
    let active: Vec<&ObserverNote> = notes
        .iter()
        .filter(|n| n.record_status == RecordStatus::Active)
        .collect();
    write_atomic(path, |out| {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(SPREADSHEET_HEADER)?;
        for note in &active {
            let [x, y, z] = note.star_pos;
            writer.write_record([
                note.system_name.clone(),
                note.z_bin.to_string(),
                opt(note.system_count),
                opt(note.effective_corrected_n()),
                opt(note.max_distance),
                x.to_string(),
                y.to_string(),
                z.to_string(),
                note.slice_status.to_string(),
                note.completeness_confidence.to_string(),
                note.sampling_method.to_string(),
                note.notes.clone(),
            ])?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    })?;
    info!(path = %path.display(), rows = active.len(), "spreadsheet csv written");
    Ok(active.len())
}

// ---------------------------------------------------------------------------
// Raw audit dump
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RawNoteRow<'a> {
    id: &'a str,
    event_id: &'a str,
    timestamp_utc: &'a str,
    created_at_utc: &'a str,
    system_name: &'a str,
    system_address: Option<i64>,
    star_pos_x: f64,
    star_pos_y: f64,
    star_pos_z: f64,
    z_bin: i64,
    session_id: &'a str,
    body_name: Option<&'a str>,
    survey_type: &'static str,
    sample_index: Option<i64>,
    system_index: Option<i64>,
    slice_status: &'static str,
    completeness_confidence: i64,
    sampling_method: &'static str,
    system_count: Option<i64>,
    corrected_n: Option<i64>,
    max_distance: Option<f64>,
    flags: String,
    notes: &'a str,
    boxel_highest_system: Option<&'a str>,
    supersedes_id: Option<&'a str>,
    record_status: &'static str,
    schema_version: i64,
    app_version: &'a str,
    payload_hash: Option<&'a str>,
    prev_hash: Option<&'a str>,
}

impl<'a> From<&'a ObserverNote> for RawNoteRow<'a> {
    fn from(note: &'a ObserverNote) -> Self {
        let [star_pos_x, star_pos_y, star_pos_z] = note.star_pos;
        Self {
            id: &note.id,
            event_id: &note.event_id,
            timestamp_utc: &note.timestamp_utc,
            created_at_utc: &note.created_at_utc,
            system_name: &note.system_name,
            system_address: note.system_address,
            star_pos_x,
            star_pos_y,
            star_pos_z,
            z_bin: note.z_bin,
            session_id: &note.session_id,
            body_name: note.body_name.as_deref(),
            survey_type: note.survey_type.as_str(),
            sample_index: note.sample_index,
            system_index: note.system_index,
            slice_status: note.slice_status.as_str(),
            completeness_confidence: note.completeness_confidence,
            sampling_method: note.sampling_method.as_str(),
            system_count: note.system_count,
            corrected_n: note.corrected_n,
            max_distance: note.max_distance,
            flags: note.flags.raised().join(";"),
            notes: &note.notes,
            boxel_highest_system: note.boxel_highest_system.as_deref(),
            supersedes_id: note.supersedes_id.as_deref(),
            record_status: note.record_status.as_str(),
            schema_version: note.schema_version,
            app_version: &note.app_version,
            payload_hash: note.payload_hash.as_deref(),
            prev_hash: note.prev_hash.as_deref(),
        }
    }
}

/// Every note, whatever its status, with its chain hashes.
pub fn export_notes_csv(notes: &[ObserverNote], path: &Path) -> ExportResult<usize> {
    write_atomic(path, |out| {
        let mut writer = csv::Writer::from_writer(out);
        for note in notes {
            writer.serialize(RawNoteRow::from(note))?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    })?;
    info!(path = %path.display(), rows = notes.len(), "raw notes csv written");
    Ok(notes.len())
}
