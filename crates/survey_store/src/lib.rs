//! `survey_store`: SQLite persistence for the survey logger.
//!
//! Observer notes form an append-only hash chain: each row stores
//! `sha256(prev_hash || canonical payload)` and rows are never rewritten,
//! only superseded. Boxel entries and the journal-derived candidate tables
//! live in the same file but outside the chain.

mod boxel;
mod candidates;
mod error;
mod integrity;
mod notes;
mod samples;
mod schema;
mod store;

pub use candidates::{CandidateFilter, CandidateObservation, CommanderStats};
pub use error::{StoreError, StoreResult};
pub use notes::SystemRef;
pub use store::{backup_path, sidecar_path, SurveyStore};
