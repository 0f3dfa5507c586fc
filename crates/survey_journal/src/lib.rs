//! `survey_journal`: reading the game's journal files.
//!
//! [`JournalReader`] finds and tails `Journal.*.log` files,
//! [`EventProcessor`] parses and routes lines, and [`JournalMonitor`] ties
//! them to the state manager and the store. [`import_journals`] replays old
//! journals in one pass to back-fill candidates.

mod candidate;
mod importer;
mod monitor;
mod processor;
mod reader;

pub use candidate::{atmosphere_text, extract_candidate, plausible_star_pos, ScanContext};
pub use importer::{import_journals, ImportStats, IMPORT_SESSION_ID};
pub use monitor::{
    JournalMonitor, MonitorControl, MonitorEvent, MonitorSettings, MonitorStatus, ReadMode,
    ScanStatus,
};
pub use processor::{apply_to_state, EventProcessor, ProcessorStats, Routed};
pub use reader::{extract_cmdr_name, list_journals, JournalReader, UNKNOWN_CMDR};
