//! Stellar density worksheets, one CSV per sample.
//!
//! Layout mirrors the community worksheet: a title row, a date row, the
//! header, then one row per system next to a fixed column of Z sample
//! heights (0 to 1000 in steps of 50).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use survey_core::{density_rho, distance_from_core, sol_distance, ObserverNote, RecordStatus, SurveyType};
use tracing::info;

use crate::atomic::write_atomic;
use crate::error::{ExportError, ExportResult};

pub const DENSITY_HEADER: [&str; 11] = [
    "System",
    "Z Sample",
    "System Count",
    "Corrected n",
    "Max Distance",
    "Rho",
    "X",
    "Y",
    "Z",
    "Dist from Sol",
    "R from Core",
];

const STATIC_Z_STEP: usize = 50;
const STATIC_Z_MAX: usize = 1000;

/// Options for [`export_density_worksheets`].
#[derive(Debug, Clone, Copy)]
pub struct DensityExport<'a> {
    pub cmdr_name: &'a str,
    /// `None` exports every density type together.
    pub survey_type: Option<SurveyType>,
    /// Only this bin, and tag the file names with it.
    pub z_bin: Option<i64>,
    pub output_dir: &'a Path,
}

/// Replace anything outside `[A-Za-z0-9_-]` so the name is file-safe.
pub fn safe_file_component(name: &str) -> String {
    let name = if name.is_empty() { "UnknownCMDR" } else { name };
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) fn file_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn parse_timestamp(ts: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(ts).ok()
}

fn exportable(note: &ObserverNote, options: &DensityExport<'_>) -> bool {
    let type_matches = match options.survey_type {
        Some(survey_type) => note.survey_type == survey_type,
        None => note.survey_type.is_density(),
    };
    type_matches
        && note.record_status == RecordStatus::Active
        && !note.system_name.trim().is_empty()
        && note.max_distance.is_some()
        && note.sample_index.is_some()
        && options.z_bin.is_none_or(|z| note.z_bin == z)
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn worksheet_row(note: Option<&ObserverNote>, static_z: Option<usize>) -> Vec<String> {
    let z_sample = opt(static_z);
    let Some(note) = note else {
        let mut row = vec![String::new(); DENSITY_HEADER.len()];
        row[1] = z_sample;
        return row;
    };
    let corrected_n = note.effective_corrected_n();
    let rho = match (corrected_n, note.max_distance) {
        (Some(n), Some(d)) => density_rho(n, d).map(|rho| rho.to_string()),
        _ => None,
    };
    let [x, y, z] = note.star_pos;
    vec![
        note.system_name.clone(),
        z_sample,
        opt(note.system_count),
        opt(corrected_n),
        opt(note.max_distance),
        rho.unwrap_or_default(),
        x.to_string(),
        y.to_string(),
        z.to_string(),
        format!("{:.2}", sol_distance(note.star_pos)),
        format!("{:.2}", distance_from_core(note.star_pos)),
    ]
}

fn write_worksheet(path: &Path, cmdr_name: &str, rows: &[&ObserverNote]) -> ExportResult<()> {
    let date = rows
        .first()
        .and_then(|note| parse_timestamp(&note.timestamp_utc))
        .map(|dt| dt.date_naive().to_string())
        .unwrap_or_default();
    let static_z: Vec<usize> = (0..=STATIC_Z_MAX).step_by(STATIC_Z_STEP).collect();
    let height = static_z.len().max(rows.len());

    write_atomic(path, |out| {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
        let cmdr = if cmdr_name.is_empty() { "UnknownCMDR" } else { cmdr_name };
        writer.write_record([format!("CMDR {cmdr} - DW3 Stellar Density Scans")])?;
        writer.write_record(["Date", date.as_str()])?;
        writer.write_record(DENSITY_HEADER)?;
        for i in 0..height {
            writer.write_record(worksheet_row(
                rows.get(i).copied(),
                static_z.get(i).copied(),
            ))?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    })
}

/// Write one worksheet per sample and return the files, in sample order.
pub fn export_density_worksheets(
    notes: &[ObserverNote],
    options: &DensityExport<'_>,
) -> ExportResult<Vec<PathBuf>> {
    let mut samples: BTreeMap<i64, Vec<&ObserverNote>> = BTreeMap::new();
    for note in notes.iter().filter(|n| exportable(n, options)) {
        if let Some(index) = note.sample_index {
            samples.entry(index).or_default().push(note);
        }
    }
    if samples.is_empty() {
        let label = options.survey_type.map_or("any", SurveyType::as_str);
        return Err(ExportError::NoSamples(label.to_string()));
    }

    let type_label = match options.survey_type {
        Some(SurveyType::LogarithmicDensity) => "Logarithmic",
        _ => "Regular",
    };
    let safe_cmdr = safe_file_component(options.cmdr_name);
    let z_part = options.z_bin.map(|z| format!("_Z{z}")).unwrap_or_default();
    let stamp = file_timestamp();

    let mut created = Vec::with_capacity(samples.len());
    for (sample_index, mut rows) in samples {
        rows.sort_by_key(|note| {
            (
                parse_timestamp(&note.timestamp_utc),
                note.system_index.unwrap_or(0),
            )
        });
        let name = format!(
            "DW3_{type_label}_Density_{safe_cmdr}{z_part}_Sample_{sample_index:02}_{stamp}.csv"
        );
        let path = options.output_dir.join(name);
        write_worksheet(&path, options.cmdr_name, &rows)?;
        info!(path = %path.display(), systems = rows.len(), "density worksheet written");
        created.push(path);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmdr_names_are_made_file_safe() {
        assert_eq!(safe_file_component("Jean-Luc Picard!"), "Jean-Luc_Picard_");
        assert_eq!(safe_file_component(""), "UnknownCMDR");
    }

    #[test]
    fn blank_rows_keep_static_z() {
        let row = worksheet_row(None, Some(350));
        assert_eq!(row.len(), DENSITY_HEADER.len());
        assert_eq!(row[1], "350");
        assert!(row[0].is_empty());
    }

    #[test]
    fn distant_full_samples_keep_rho_precision() {
        for max_distance in [100.0, 300.0, 750.0] {
            let note = ObserverNote {
                system_name: "Far".to_string(),
                corrected_n: Some(50),
                max_distance: Some(max_distance),
                ..ObserverNote::default()
            };
            let row = worksheet_row(Some(&note), Some(0));
            let written: f64 = row[5].parse().unwrap();
            let exact = density_rho(50, max_distance).unwrap();
            assert!(written > 0.0, "rho written as {}", row[5]);
            assert!(((written - exact) / exact).abs() < 1e-12, "{} vs {exact}", row[5]);
        }
    }
}
