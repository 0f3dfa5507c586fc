//! `survey_core`: observation model and journal-derived context.
//!
//! No IO, no database. Everything here is a pure function of its inputs
//! except [`JournalStateManager`], which only guards in-memory state.

mod error;
mod events;
mod geometry;
mod hash;
mod note;
pub mod rating;
mod state;
mod types;

pub use error::{UnknownVariant, ValidationError};
pub use events::{parse_line, EventKind, JournalEvent};
pub use geometry::{
    calculate_z_bin, density_rho, distance_from_core, sol_distance, survey_axis,
    GALACTIC_CORE, Z_BIN_SIZE,
};
pub use hash::{canonical_json, chain_hash, generate_event_id, link_hash, sha256_hex};
pub use note::{now_utc_iso, ObserverNote, CURRENT_SCHEMA_VERSION};
pub use state::{CallbackId, JournalStateManager, Z_BIN_HISTORY_LIMIT};
pub use types::*;
