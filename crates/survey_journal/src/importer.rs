//! Back-filling candidates from old journals.

use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use survey_core::rating::RatingConfig;
use survey_core::{parse_line, CandidateRecord, EventKind};
use survey_store::SurveyStore;
use tracing::{debug, info, warn};

use crate::candidate::{extract_candidate, plausible_star_pos, ScanContext};
use crate::reader::list_journals;

/// Session id stamped on every imported candidate.
pub const IMPORT_SESSION_ID: &str = "IMPORT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub files_processed: usize,
    pub events_processed: usize,
    pub candidates_found: usize,
    pub duplicates_skipped: usize,
    pub errors: usize,
}

/// Import candidates from every journal in `journal_dir`, oldest first.
/// With `cmdr_filter`, only events logged while that commander was loaded
/// count. Bad lines and failed inserts are tallied, not fatal.
pub fn import_journals(
    journal_dir: &Path,
    store: &SurveyStore,
    cmdr_filter: Option<&str>,
    rating: &RatingConfig,
) -> ImportStats {
    let mut stats = ImportStats::default();
    let journals = list_journals(journal_dir);
    if journals.is_empty() {
        info!(dir = %journal_dir.display(), "no journal files found");
        return stats;
    }
    info!(files = journals.len(), "importing journals");

    for journal in &journals {
        if let Err(err) = import_file(journal, store, cmdr_filter, rating, &mut stats) {
            warn!(file = %journal.display(), error = %format!("{err:#}"), "journal import failed");
            stats.errors += 1;
        }
    }
    info!(
        files = stats.files_processed,
        events = stats.events_processed,
        candidates = stats.candidates_found,
        duplicates = stats.duplicates_skipped,
        errors = stats.errors,
        "import finished"
    );
    stats
}

fn import_file(
    journal: &Path,
    store: &SurveyStore,
    cmdr_filter: Option<&str>,
    rating: &RatingConfig,
    stats: &mut ImportStats,
) -> Result<()> {
    let file =
        std::fs::File::open(journal).with_context(|| format!("opening {}", journal.display()))?;
    debug!(file = %journal.display(), "importing");

    let mut context = ScanContext {
        session_id: IMPORT_SESSION_ID.to_string(),
        ..ScanContext::default()
    };
    for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line.with_context(|| format!("reading {}", journal.display()))?;
        let line = String::from_utf8_lossy(&line);
        if line.trim().is_empty() {
            continue;
        }
        let Some(event) = parse_line(&line) else {
            debug!(line = index + 1, "unparseable journal line");
            stats.errors += 1;
            continue;
        };
        stats.events_processed += 1;

        let kind = event.kind();
        if matches!(kind, EventKind::LoadGame | EventKind::Commander) {
            if let Some(name) = event.commander_name() {
                context.cmdr_name = Some(name.to_string());
            }
            continue;
        }
        if cmdr_filter.is_some_and(|f| context.cmdr_name.as_deref() != Some(f)) {
            continue;
        }
        match kind {
            EventKind::Location | EventKind::FsdJump => {
                context.system_name = event.star_system().map(str::to_string);
                context.system_address = event.system_address();
                context.star_pos = plausible_star_pos(&event).unwrap_or_default();
            }
            EventKind::Scan => {
                if let Some(candidate) = extract_candidate(&event, &context, rating) {
                    log_imported(store, &candidate, stats);
                }
            }
            _ => {}
        }
    }
    stats.files_processed += 1;
    Ok(())
}

fn log_imported(store: &SurveyStore, candidate: &CandidateRecord, stats: &mut ImportStats) {
    match store.log_candidate(candidate) {
        Ok(true) => {
            stats.candidates_found += 1;
            info!(
                body = %candidate.body_name,
                rating = %candidate.earth2_rating,
                kind = %candidate.candidate_type,
                "imported candidate"
            );
        }
        Ok(false) => stats.duplicates_skipped += 1,
        Err(err) => {
            warn!(body = %candidate.body_name, error = %err, "failed to log candidate");
            stats.errors += 1;
        }
    }
}
