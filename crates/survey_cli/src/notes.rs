//! `note` and `boxel` subcommands.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use survey_config::AppConfig;
use survey_core::{
    calculate_z_bin, now_utc_iso, survey_axis, BoxelEntry, JournalContext, JournalStateManager,
    ObservationFlags, ObserverNote, SamplingMethod, SliceStatus, SurveyType,
};
use survey_journal::{apply_to_state, JournalReader};
use survey_store::{SurveyStore, SystemRef};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum NoteCommand {
    /// Record an observation. Position comes from the newest journal unless --system is given.
    Add {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        input: NoteInput,
    },
    /// Replace an active observation with corrected values.
    Amend {
        id: String,
        #[command(flatten)]
        input: NoteInput,
    },
    /// Withdraw an active observation.
    Delete {
        id: String,
        #[arg(long)]
        reason: String,
    },
    /// Print one stored row as JSON.
    Show { id: String },
    /// List observations, newest first.
    List(ListArgs),
    /// Every version of an observation, oldest first.
    History { id: String },
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, default_value_t = 20)]
    limit: usize,
    #[arg(long, default_value_t = 0)]
    offset: usize,
    #[arg(long, allow_hyphen_values = true)]
    z_bin: Option<i64>,
    #[arg(long, conflicts_with = "z_bin")]
    system: Option<String>,
    #[arg(long, conflicts_with_all = ["z_bin", "system"])]
    session: Option<String>,
    /// Include amended, deleted and reset rows.
    #[arg(long)]
    all: bool,
}

#[derive(Subcommand)]
pub enum BoxelCommand {
    /// Record the highest-numbered system found in the current boxel.
    Add {
        highest: String,
        #[arg(long)]
        cmdr: Option<String>,
    },
    List {
        /// Include entries retired by `boxel reset`.
        #[arg(long)]
        all: bool,
    },
    /// Retire every active boxel entry.
    Reset,
}

#[derive(Args, Default)]
pub struct LocationArgs {
    #[arg(long)]
    system: Option<String>,
    #[arg(long, requires = "system")]
    system_address: Option<i64>,
    /// Galactic coordinates in light years, as X,Y,Z.
    #[arg(long, requires = "system", value_delimiter = ',', allow_hyphen_values = true)]
    pos: Option<Vec<f64>>,
    #[arg(long)]
    body: Option<String>,
    #[arg(long)]
    session: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FlagArg {
    BiasRisk,
    LowCoverage,
    AnomalySuspected,
    Interrupted,
    RepeatNeeded,
}

/// CMDR-entered fields. Anything left out keeps its current value.
#[derive(Args, Default)]
pub struct NoteInput {
    #[arg(long)]
    survey_type: Option<SurveyType>,
    #[arg(long)]
    status: Option<SliceStatus>,
    #[arg(long)]
    confidence: Option<i64>,
    #[arg(long)]
    method: Option<SamplingMethod>,
    /// Systems counted in the slice, excluding the one you are in.
    #[arg(long)]
    count: Option<i64>,
    #[arg(long)]
    max_distance: Option<f64>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    boxel_highest: Option<String>,
    /// Raise an observation flag. Repeatable.
    #[arg(long = "flag", value_enum)]
    flags: Vec<FlagArg>,
}

impl NoteInput {
    fn apply(self, note: &mut ObserverNote) {
        if let Some(survey_type) = self.survey_type {
            note.survey_type = survey_type;
        }
        if let Some(status) = self.status {
            note.slice_status = status;
        }
        if let Some(confidence) = self.confidence {
            note.completeness_confidence = confidence;
        }
        if let Some(method) = self.method {
            note.sampling_method = method;
        }
        if self.count.is_some() {
            note.system_count = self.count;
        }
        if self.max_distance.is_some() {
            note.max_distance = self.max_distance;
        }
        if let Some(notes) = self.notes {
            note.notes = notes;
        }
        if self.boxel_highest.is_some() {
            note.boxel_highest_system = self.boxel_highest;
        }
        for flag in self.flags {
            raise(&mut note.flags, flag);
        }
    }
}

fn raise(flags: &mut ObservationFlags, flag: FlagArg) {
    let slot = match flag {
        FlagArg::BiasRisk => &mut flags.bias_risk,
        FlagArg::LowCoverage => &mut flags.low_coverage,
        FlagArg::AnomalySuspected => &mut flags.anomaly_suspected,
        FlagArg::Interrupted => &mut flags.interrupted,
        FlagArg::RepeatNeeded => &mut flags.repeat_needed,
    };
    *slot = true;
}

// ---------------------------------------------------------------------------
// Journal context
// ---------------------------------------------------------------------------

/// Context rebuilt from the head of the newest journal. `None` when the
/// journal folder has no journals.
pub fn journal_context(config: &AppConfig) -> Result<Option<JournalContext>> {
    let reader = JournalReader::new(
        config.journal_dir(),
        config.monitoring.journal_seed_max_bytes,
    );
    let Some(newest) = reader.find_newest_journal() else {
        return Ok(None);
    };
    let events = reader
        .seed_initial_state(&newest)
        .with_context(|| format!("reading {}", newest.display()))?;
    let state = JournalStateManager::new(config.monitoring.z_bin_size);
    for event in &events {
        apply_to_state(&state, event);
    }
    Ok(Some(state.context()))
}

fn resolve_location(config: &AppConfig, location: LocationArgs) -> Result<JournalContext> {
    let mut context = match location.system {
        Some(system) => {
            let star_pos = match location.pos {
                Some(values) => <[f64; 3]>::try_from(values.as_slice())
                    .map_err(|_| anyhow!("--pos takes exactly three values, X,Y,Z"))?,
                None => [0.0; 3],
            };
            JournalContext {
                system_name: Some(system),
                system_address: location.system_address,
                star_pos,
                z_bin: calculate_z_bin(survey_axis(star_pos), config.monitoring.z_bin_size),
                ..JournalContext::default()
            }
        }
        None => {
            let journal_dir = config.journal_dir();
            let context = journal_context(config)?.with_context(|| {
                format!("no journal in {}; pass --system", journal_dir.display())
            })?;
            if context.system_name.is_none() {
                bail!("the newest journal has no position yet; pass --system");
            }
            context
        }
    };
    if location.body.is_some() {
        context.last_scan_body = location.body;
    }
    if location.session.is_some() {
        context.session_id = location.session;
    }
    Ok(context)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn position(index: Option<i64>) -> String {
    index.map_or_else(|| "-".to_string(), |i| i.to_string())
}

pub fn summary_line(note: &ObserverNote) -> String {
    format!(
        "{id}  {ts}  {system:<28} z={z_bin:>5}  {survey_type:<19} sample {sample}/{index}  {slice:<11} {status}",
        id = note.id,
        ts = note.timestamp_utc,
        system = note.system_name,
        z_bin = note.z_bin,
        survey_type = note.survey_type,
        sample = position(note.sample_index),
        index = position(note.system_index),
        slice = note.slice_status,
        status = note.record_status,
    )
}

fn print_note(note: &ObserverNote) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(note)?);
    println!(
        "payload_hash: {}\nprev_hash: {}",
        note.payload_hash.as_deref().unwrap_or("-"),
        note.prev_hash.as_deref().unwrap_or("-"),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn list_page(store: &SurveyStore, args: &ListArgs) -> Result<Vec<ObserverNote>> {
    let active_only = !args.all;
    let notes = if let Some(z_bin) = args.z_bin {
        store.get_by_z_bin(z_bin, active_only)?
    } else if let Some(system) = &args.system {
        store.get_by_system(SystemRef::Name(system), active_only)?
    } else if let Some(session) = &args.session {
        store.get_by_session(session, active_only)?
    } else if active_only {
        return Ok(store.get_active(args.limit, args.offset)?);
    } else {
        let mut notes = store.get_all_notes()?;
        notes.reverse();
        notes
    };
    Ok(notes
        .into_iter()
        .skip(args.offset)
        .take(args.limit)
        .collect())
}

pub fn run_note(config: &AppConfig, store: &SurveyStore, command: NoteCommand) -> Result<()> {
    match command {
        NoteCommand::Add { location, input } => {
            let context = resolve_location(config, location)?;
            let mut note = ObserverNote::from_context(&context, &config.application.version);
            input.apply(&mut note);
            store.save_note(&mut note)?;
            println!("{}", summary_line(&note));
        }
        NoteCommand::Amend { id, input } => {
            let original = store
                .get_note(&id)?
                .with_context(|| format!("no observation with id {id}"))?;
            let mut amended = ObserverNote {
                id: String::new(),
                created_at_utc: now_utc_iso(),
                app_version: config.application.version.clone(),
                ..original
            };
            input.apply(&mut amended);
            store.amend_note(&id, &mut amended)?;
            println!("{}", summary_line(&amended));
        }
        NoteCommand::Delete { id, reason } => {
            let marker = store.delete_note(&id, &reason)?;
            println!("deleted {id} (marker {marker})");
        }
        NoteCommand::Show { id } => {
            let note = store
                .get_note(&id)?
                .with_context(|| format!("no observation with id {id}"))?;
            print_note(&note)?;
        }
        NoteCommand::List(args) => {
            for note in list_page(store, &args)? {
                println!("{}", summary_line(&note));
            }
        }
        NoteCommand::History { id } => {
            let history = store.get_amendment_history(&id)?;
            if history.is_empty() {
                bail!("no observation with id {id}");
            }
            for note in &history {
                println!("{}", summary_line(note));
            }
        }
    }
    Ok(())
}

pub fn run_boxel(config: &AppConfig, store: &SurveyStore, command: BoxelCommand) -> Result<()> {
    match command {
        BoxelCommand::Add { highest, cmdr } => {
            let context = journal_context(config)?.unwrap_or_default();
            let mut entry = BoxelEntry {
                cmdr_name: cmdr.or(context.cmdr_name).unwrap_or_default(),
                system_name: context.system_name.unwrap_or_default(),
                system_address: context.system_address,
                star_pos: context.star_pos,
                boxel_highest_system: highest,
                session_id: context.session_id.unwrap_or_default(),
                ..BoxelEntry::default()
            };
            let id = store.save_boxel_entry(&mut entry)?;
            println!("saved {id}: {}", entry.boxel_highest_system);
        }
        BoxelCommand::List { all } => {
            for entry in store.get_boxel_entries(all)? {
                println!(
                    "{}  {}  {:<24} {:<28} {}",
                    entry.id,
                    entry.created_at_utc,
                    entry.cmdr_name,
                    entry.boxel_highest_system,
                    entry.record_status
                );
            }
        }
        BoxelCommand::Reset => {
            let affected = store.reset_boxel_entries()?;
            println!("retired {affected} boxel entries");
        }
    }
    Ok(())
}
