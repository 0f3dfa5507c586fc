use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The survey database: observer notes, boxel entries, and the
/// journal-derived candidate tables, all in one SQLite file.
///
/// One connection behind a mutex. Every public method takes `&self`, so a
/// store is shared as `Arc<SurveyStore>` between the journal monitor and the
/// front ends.
#[derive(Debug)]
pub struct SurveyStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SurveyStore {
    /// Open (or create) the database at `path`.
    ///
    /// A database still holding schema-1 observations is copied to
    /// `<name>.pre-v2.bak` and replaced by an empty one: those rows were
    /// binned on the wrong axis and cannot be repaired in place.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = connect(&path)?;
        let legacy_rows = schema::legacy_row_count(&conn)?;
        if legacy_rows > 0 {
            warn!(
                rows = legacy_rows,
                path = %path.display(),
                "found schema-1 observations, discarding"
            );
            drop(conn);
            let backup = backup_path(&path);
            std::fs::copy(&path, &backup)?;
            std::fs::remove_file(&path)?;
            for sidecar in [sidecar_path(&path, "-wal"), sidecar_path(&path, "-shm")] {
                remove_if_present(&sidecar)?;
            }
            info!(backup = %backup.display(), "backed up pre-v2 database");
            conn = connect(&path)?;
        }

        schema::install_schema(&conn)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// A private in-memory database with the full schema.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::install_schema(&conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

fn connect(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    schema::apply_pragmas(&conn)?;
    Ok(conn)
}

/// `survey.db` -> `survey.pre-v2.bak`.
pub fn backup_path(db_path: &Path) -> PathBuf {
    db_path.with_extension("pre-v2.bak")
}

/// SQLite's WAL and shared-memory files live beside the database with a
/// suffix appended to the full file name.
pub fn sidecar_path(db_path: &Path, suffix: &str) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
