//! Live journal tailing.
//!
//! [`JournalMonitor::tick`] does one bounded slice of work: initialize,
//! rescan, check for rotation, then drain whatever lines are waiting.
//! The caller owns the loop and sleeps [`JournalMonitor::poll_delay`]
//! between ticks. [`MonitorControl`] is the only thing shared with other
//! threads.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use survey_config::AppConfig;
use survey_core::rating::RatingConfig;
use survey_core::{CallbackId, CandidateRecord, JournalEvent, JournalStateManager, ZBinChange};
use survey_store::SurveyStore;
use tracing::{debug, info, warn};

use crate::candidate::{extract_candidate, plausible_star_pos, ScanContext};
use crate::processor::{EventProcessor, ProcessorStats, Routed};
use crate::reader::{extract_cmdr_name, JournalReader, UNKNOWN_CMDR};

/// Upper bound on lines handled per tick so pause and stop stay responsive.
const MAX_LINES_PER_TICK: usize = 1_000;

// ---------------------------------------------------------------------------
// Settings and control
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub journal_dir: PathBuf,
    pub poll_fast: Duration,
    pub poll_slow: Duration,
    pub rotation_check: Duration,
    pub seed_max_bytes: u64,
    /// Replay the newest journal from its first line instead of tailing.
    pub from_start: bool,
    pub rating: RatingConfig,
}

fn seconds(value: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or(fallback)
}

impl MonitorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let monitoring = &config.monitoring;
        Self {
            journal_dir: config.journal_dir(),
            poll_fast: seconds(monitoring.poll_fast_seconds, Duration::from_millis(100)),
            poll_slow: seconds(monitoring.poll_slow_seconds, Duration::from_millis(250)),
            rotation_check: seconds(monitoring.rotation_check_seconds, Duration::from_secs(5)),
            seed_max_bytes: monitoring.journal_seed_max_bytes,
            from_start: config.application.test_mode && config.application.read_from_start,
            rating: config.rating.clone(),
        }
    }
}

/// Requests from other threads, checked at the top of every tick.
#[derive(Debug, Default)]
pub struct MonitorControl {
    paused: AtomicBool,
    rescan: AtomicBool,
    stopped: AtomicBool,
}

impl MonitorControl {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn request_rescan(&self) {
        self.rescan.store(true, Ordering::SeqCst);
    }

    /// Consume a pending rescan request.
    pub fn take_rescan_request(&self) -> bool {
        self.rescan.swap(false, Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Events and status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    Tail,
    FromStart,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    #[default]
    NoSignal,
    Armed,
    Active,
    Paused,
    Rescanning,
}

/// Something the monitor noticed, for whoever is listening.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    JournalOpened {
        file: String,
        mode: ReadMode,
    },
    JournalRotated {
        file: String,
    },
    CommanderChanged {
        cmdr_name: String,
    },
    Jumped {
        system_name: String,
        first_visit: bool,
        systems_visited: usize,
    },
    ZBinChanged(ZBinChange),
    BodyScanned {
        body_name: String,
        bodies_scanned: u64,
    },
    CandidateLogged {
        candidate: Box<CandidateRecord>,
        was_new: bool,
    },
    RescanComplete {
        files: usize,
        new_candidates: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub scan_status: ScanStatus,
    pub journal_file: Option<String>,
    pub read_mode: Option<ReadMode>,
    pub cmdr_name: Option<String>,
    pub session_id: Option<String>,
    pub current_system: Option<String>,
    #[serde(flatten)]
    pub processor: ProcessorStats,
    pub systems_visited: usize,
    pub bodies_scanned: u64,
    pub candidates_logged: u64,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn commander_event(name: &str) -> Option<JournalEvent> {
    JournalEvent::from_value(json!({
        "timestamp": survey_core::now_utc_iso(),
        "event": "Commander",
        "Name": name,
    }))
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct JournalMonitor {
    settings: MonitorSettings,
    reader: JournalReader,
    processor: EventProcessor,
    state: Arc<JournalStateManager>,
    store: Arc<SurveyStore>,
    control: Arc<MonitorControl>,
    z_bin_changes: Arc<Mutex<Vec<ZBinChange>>>,
    z_bin_callback: CallbackId,

    initialized: bool,
    waiting: bool,
    last_rotation_check: Instant,
    status: MonitorStatus,
    system_address: Option<i64>,
    star_pos: [f64; 3],
    visited_systems: HashSet<String>,
}

impl JournalMonitor {
    pub fn new(
        settings: MonitorSettings,
        state: Arc<JournalStateManager>,
        store: Arc<SurveyStore>,
    ) -> Self {
        let z_bin_changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&z_bin_changes);
        let z_bin_callback =
            state.register_z_bin_callback(move |change: &ZBinChange| sink.lock().push(change.clone()));
        Self {
            reader: JournalReader::new(&settings.journal_dir, settings.seed_max_bytes),
            settings,
            processor: EventProcessor::new(),
            state,
            store,
            control: Arc::new(MonitorControl::default()),
            z_bin_changes,
            z_bin_callback,
            initialized: false,
            waiting: false,
            last_rotation_check: Instant::now(),
            status: MonitorStatus::default(),
            system_address: None,
            star_pos: [0.0; 3],
            visited_systems: HashSet::new(),
        }
    }

    pub fn control(&self) -> Arc<MonitorControl> {
        Arc::clone(&self.control)
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            processor: self.processor.stats(),
            ..self.status.clone()
        }
    }

    /// How long to wait before the next tick.
    pub fn poll_delay(&self) -> Duration {
        match self.status.scan_status {
            ScanStatus::NoSignal | ScanStatus::Paused => self.settings.poll_slow,
            _ => self.settings.poll_fast,
        }
    }

    /// Follow a different journal folder from the next tick on.
    pub fn set_journal_dir(&mut self, journal_dir: impl Into<PathBuf>) {
        let journal_dir = journal_dir.into();
        info!(dir = %journal_dir.display(), "journal folder changed");
        self.settings.journal_dir.clone_from(&journal_dir);
        self.reader.set_journal_dir(journal_dir);
        self.control.request_rescan();
    }

    /// One slice of monitoring work.
    pub fn tick(&mut self) -> Result<Vec<MonitorEvent>> {
        if self.control.is_stopped() {
            return Ok(Vec::new());
        }
        if self.control.is_paused() {
            if self.status.scan_status != ScanStatus::Paused {
                info!("journal monitor paused");
                self.status.scan_status = ScanStatus::Paused;
            }
            return Ok(Vec::new());
        }
        if self.status.scan_status == ScanStatus::Paused {
            info!("journal monitor resumed");
            self.status.scan_status = ScanStatus::Armed;
        }
        if !self.initialized {
            return self.initialize();
        }
        if self.control.take_rescan_request() {
            return self.rescan();
        }

        let mut events = Vec::new();
        if self.last_rotation_check.elapsed() >= self.settings.rotation_check {
            self.last_rotation_check = Instant::now();
            events.extend(self.check_rotation()?);
        }
        events.extend(self.poll()?);
        Ok(events)
    }

    /// Open the newest journal, replay its head into the state manager and
    /// start a session for its commander. Does nothing until a journal
    /// exists.
    pub fn initialize(&mut self) -> Result<Vec<MonitorEvent>> {
        let Some(journal) = self.reader.find_newest_journal() else {
            if !self.waiting {
                info!(dir = %self.settings.journal_dir.display(), "waiting for journal file");
                self.waiting = true;
            }
            self.status.scan_status = ScanStatus::NoSignal;
            return Ok(Vec::new());
        };

        let from_start = self.settings.from_start;
        self.reader
            .open(&journal, from_start)
            .with_context(|| format!("opening journal {}", journal.display()))?;
        self.initialized = true;
        self.waiting = false;
        self.last_rotation_check = Instant::now();

        let mut events = Vec::new();
        let seeded = self
            .reader
            .seed_initial_state(&journal)
            .with_context(|| format!("seeding from {}", journal.display()))?;
        for event in &seeded {
            self.handle_event(event, &mut events)?;
        }

        let cmdr = extract_cmdr_name(&journal);
        if cmdr != UNKNOWN_CMDR {
            let session_id = self
                .store
                .start_session(&cmdr, &file_name(&journal))
                .context("starting session")?;
            self.state.set_session_info(&session_id, &cmdr);
            self.status.session_id = Some(session_id);
            self.status.cmdr_name = Some(cmdr);
        }

        let mode = if from_start {
            ReadMode::FromStart
        } else {
            ReadMode::Tail
        };
        self.status.journal_file = Some(file_name(&journal));
        self.status.read_mode = Some(mode);
        self.status.scan_status = ScanStatus::Armed;
        info!(file = %file_name(&journal), ?mode, "monitoring journal");
        events.push(MonitorEvent::JournalOpened {
            file: file_name(&journal),
            mode,
        });
        Ok(events)
    }

    /// Drain the lines that are waiting in the open journal.
    pub fn poll(&mut self) -> Result<Vec<MonitorEvent>> {
        let mut events = Vec::new();
        if self.reader.is_rotated() {
            events.extend(self.reopen_after_rotation()?);
        }

        for _ in 0..MAX_LINES_PER_TICK {
            let line = match self.reader.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "journal read failed");
                    self.reader.close();
                    break;
                }
            };
            if let Some(event) = self.processor.parse_line(&line) {
                self.handle_event(&event, &mut events)?;
                self.status.scan_status = ScanStatus::Active;
            }
        }
        Ok(events)
    }

    /// Switch to a newer journal if the game started one.
    pub fn check_rotation(&mut self) -> Result<Vec<MonitorEvent>> {
        let Some(newest) = self.reader.find_newest_journal() else {
            return Ok(Vec::new());
        };
        if self.reader.current_file() == Some(newest.as_path()) {
            return Ok(Vec::new());
        }
        self.switch_to(&newest)
    }

    fn reopen_after_rotation(&mut self) -> Result<Vec<MonitorEvent>> {
        match self.reader.current_file().map(Path::to_path_buf) {
            Some(current) if current.exists() => {
                info!(file = %file_name(&current), "reopening journal after rotation");
                self.reader
                    .open(&current, false)
                    .with_context(|| format!("reopening {}", current.display()))?;
                Ok(Vec::new())
            }
            _ => match self.reader.find_newest_journal() {
                Some(newest) => self.switch_to(&newest),
                None => {
                    self.reader.close();
                    self.status.scan_status = ScanStatus::NoSignal;
                    Ok(Vec::new())
                }
            },
        }
    }

    fn switch_to(&mut self, journal: &Path) -> Result<Vec<MonitorEvent>> {
        info!(file = %file_name(journal), "journal rotation detected");
        self.reader
            .open(journal, false)
            .with_context(|| format!("opening journal {}", journal.display()))?;
        self.status.journal_file = Some(file_name(journal));
        self.status.read_mode = Some(ReadMode::Tail);

        let mut events = vec![MonitorEvent::JournalRotated {
            file: file_name(journal),
        }];
        let cmdr = extract_cmdr_name(journal);
        if cmdr != UNKNOWN_CMDR {
            if let Some(event) = commander_event(&cmdr) {
                self.update_commander(&event, &mut events);
            }
        }
        Ok(events)
    }

    /// Replay every journal from its first line, then go back to tailing
    /// the newest one.
    pub fn rescan(&mut self) -> Result<Vec<MonitorEvent>> {
        self.status.scan_status = ScanStatus::Rescanning;
        let journals = self.reader.find_all_journals();
        info!(files = journals.len(), "rescanning journal history");

        let mut new_candidates = 0;
        let mut files = 0;
        for journal in &journals {
            if self.control.is_stopped() {
                break;
            }
            match self.replay_file(journal) {
                Ok(found) => {
                    new_candidates += found;
                    files += 1;
                }
                Err(err) => warn!(file = %file_name(journal), error = %err, "rescan failed for file"),
            }
        }

        let mut events = Vec::new();
        if let Some(newest) = self.reader.find_newest_journal() {
            self.reader
                .open(&newest, false)
                .with_context(|| format!("opening journal {}", newest.display()))?;
            self.status.journal_file = Some(file_name(&newest));
            self.status.read_mode = Some(ReadMode::Tail);
            self.initialized = true;
        }
        self.status.scan_status = ScanStatus::Armed;
        info!(files, new_candidates, "rescan complete");
        events.push(MonitorEvent::RescanComplete {
            files,
            new_candidates,
        });
        Ok(events)
    }

    fn replay_file(&mut self, journal: &Path) -> Result<usize> {
        let text = std::fs::read(journal)
            .with_context(|| format!("reading {}", journal.display()))?;
        let mut found = 0;
        let mut scratch = Vec::new();
        for line in String::from_utf8_lossy(&text).lines() {
            if self.control.is_stopped() {
                break;
            }
            if let Some(event) = self.processor.parse_line(line) {
                self.handle_event(&event, &mut scratch)?;
            }
            found += scratch
                .drain(..)
                .filter(|e| matches!(e, MonitorEvent::CandidateLogged { was_new: true, .. }))
                .count();
        }
        Ok(found)
    }

    /// End the session and let go of the journal.
    pub fn shutdown(&mut self) -> Result<()> {
        self.control.stop();
        self.reader.close();
        self.state.unregister_z_bin_callback(self.z_bin_callback);
        if let Some(session_id) = self.status.session_id.take() {
            self.store
                .end_session(&session_id)
                .with_context(|| format!("ending session {session_id}"))?;
        }
        self.state.clear_session();
        self.status.scan_status = ScanStatus::NoSignal;
        info!("journal monitor stopped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    fn handle_event(&mut self, event: &JournalEvent, out: &mut Vec<MonitorEvent>) -> Result<()> {
        match EventProcessor::route(event) {
            Some(Routed::Commander) => self.update_commander(event, out),
            Some(Routed::Location) => {
                self.update_position(event);
                self.state.on_location(event);
            }
            Some(Routed::Jump) => {
                self.update_position(event);
                self.record_jump(event, out);
            }
            Some(Routed::Scan) => self.record_scan(event, out)?,
            Some(Routed::SaaScanComplete) => {
                debug!(body = event.body_name().unwrap_or_default(), "surface mapped");
            }
            None => {}
        }
        Ok(())
    }

    fn update_commander(&mut self, event: &JournalEvent, out: &mut Vec<MonitorEvent>) {
        let Some(name) = event.commander_name() else {
            return;
        };
        if self.status.cmdr_name.as_deref() == Some(name) {
            return;
        }
        info!(cmdr = name, "commander");
        self.status.cmdr_name = Some(name.to_string());
        self.state.on_commander(event);
        out.push(MonitorEvent::CommanderChanged {
            cmdr_name: name.to_string(),
        });
    }

    fn update_position(&mut self, event: &JournalEvent) {
        if let Some(system) = event.star_system() {
            self.status.current_system = Some(system.to_string());
        }
        if let Some(address) = event.system_address() {
            self.system_address = Some(address);
        }
        if let Some(pos) = plausible_star_pos(event) {
            self.star_pos = pos;
        }
    }

    fn record_jump(&mut self, event: &JournalEvent, out: &mut Vec<MonitorEvent>) {
        if let Some(system) = event.star_system() {
            let first_visit = self.visited_systems.insert(system.to_string());
            self.status.systems_visited = self.visited_systems.len();
            out.push(MonitorEvent::Jumped {
                system_name: system.to_string(),
                first_visit,
                systems_visited: self.status.systems_visited,
            });
        }

        self.state.on_fsd_jump(event);
        for change in self.z_bin_changes.lock().drain(..) {
            info!(
                from = change.old_z_bin,
                to = change.new_z_bin,
                system = %change.system_name,
                "z-bin changed"
            );
            out.push(MonitorEvent::ZBinChanged(change));
        }
    }

    fn record_scan(&mut self, event: &JournalEvent, out: &mut Vec<MonitorEvent>) -> Result<()> {
        if let Some(body) = event.body_name() {
            self.status.bodies_scanned += 1;
            out.push(MonitorEvent::BodyScanned {
                body_name: body.to_string(),
                bodies_scanned: self.status.bodies_scanned,
            });
        }
        self.state.on_scan(event);

        let context = ScanContext {
            cmdr_name: self.status.cmdr_name.clone(),
            session_id: self.status.session_id.clone().unwrap_or_default(),
            system_name: self.status.current_system.clone(),
            system_address: self.system_address,
            star_pos: self.star_pos,
        };
        let Some(candidate) = extract_candidate(event, &context, &self.settings.rating) else {
            return Ok(());
        };
        let was_new = self
            .store
            .log_candidate(&candidate)
            .with_context(|| format!("logging candidate {}", candidate.body_name))?;
        if was_new {
            self.status.candidates_logged += 1;
            info!(
                body = %candidate.body_name,
                kind = %candidate.candidate_type,
                rating = %candidate.earth2_rating,
                "candidate logged"
            );
        }
        out.push(MonitorEvent::CandidateLogged {
            candidate: Box::new(candidate),
            was_new,
        });
        Ok(())
    }
}
