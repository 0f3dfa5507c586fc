use rusqlite::{Connection, OptionalExtension};

const OBSERVER_NOTES: &str = "
CREATE TABLE IF NOT EXISTS observer_notes (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    created_at_utc TEXT NOT NULL,

    event_id TEXT NOT NULL DEFAULT '',
    timestamp_utc TEXT NOT NULL DEFAULT '',
    system_address INTEGER,
    system_name TEXT NOT NULL,
    z_bin INTEGER NOT NULL,
    session_id TEXT NOT NULL DEFAULT '',
    slice_status TEXT NOT NULL,
    completeness_confidence INTEGER,
    sampling_method TEXT,

    system_count INTEGER,
    corrected_n INTEGER,
    max_distance REAL,
    sample_index INTEGER,
    system_index INTEGER,
    survey_type TEXT DEFAULT 'regular_density',
    boxel_highest_system TEXT,

    supersedes_id TEXT REFERENCES observer_notes(id),
    record_status TEXT NOT NULL DEFAULT 'active',
    schema_version INTEGER NOT NULL DEFAULT 2,

    payload_json TEXT NOT NULL,
    payload_hash TEXT NOT NULL,
    prev_hash TEXT
);
";

const BOXEL_ENTRIES: &str = "
CREATE TABLE IF NOT EXISTS boxel_entries (
    id TEXT PRIMARY KEY,
    created_at_utc TEXT NOT NULL,
    cmdr_name TEXT NOT NULL DEFAULT '',
    system_name TEXT NOT NULL DEFAULT '',
    system_address INTEGER,
    star_pos_x REAL,
    star_pos_y REAL,
    star_pos_z REAL,
    boxel_highest_system TEXT NOT NULL,
    session_id TEXT NOT NULL DEFAULT '',
    record_status TEXT NOT NULL DEFAULT 'active'
);
";

const CANDIDATES: &str = "
CREATE TABLE IF NOT EXISTS candidates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_utc TEXT,
    event TEXT,
    event_id TEXT,
    system_address INTEGER,
    star_system TEXT,
    body_name TEXT,
    body_id INTEGER,
    distance_from_arrival_ls REAL,
    candidate_type TEXT,
    terraform_state TEXT,
    planet_class TEXT,
    atmosphere TEXT,
    volcanism TEXT,
    mass_em REAL,
    radius_km REAL,
    surface_gravity_g REAL,
    surface_temp_k REAL,
    surface_pressure_atm REAL,
    landable INTEGER,
    tidal_lock INTEGER,
    rotation_period_days REAL,
    orbital_period_days REAL,
    semi_major_axis_au REAL,
    orbital_eccentricity REAL,
    axial_tilt_deg REAL,
    was_discovered INTEGER,
    was_mapped INTEGER,
    earth2_rating TEXT,
    similarity_score REAL,
    goldilocks_score INTEGER,
    goldilocks_category TEXT,
    worth_landing TEXT,
    worth_reason TEXT,
    distance_from_sol_ly REAL,
    star_pos_x REAL,
    star_pos_y REAL,
    star_pos_z REAL,
    cmdr_name TEXT,
    session_id TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(star_system, body_name, cmdr_name)
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    cmdr_name TEXT,
    journal_file TEXT,
    start_time TEXT,
    end_time TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS commander_stats (
    cmdr_name TEXT PRIMARY KEY,
    total_all INTEGER NOT NULL DEFAULT 0,
    total_elw INTEGER NOT NULL DEFAULT 0,
    total_terraformable INTEGER NOT NULL DEFAULT 0,
    total_earth_twin INTEGER NOT NULL DEFAULT 0,
    total_excellent INTEGER NOT NULL DEFAULT 0,
    total_very_good INTEGER NOT NULL DEFAULT 0,
    total_good INTEGER NOT NULL DEFAULT 0,
    total_fair INTEGER NOT NULL DEFAULT 0,
    total_marginal INTEGER NOT NULL DEFAULT 0,
    total_poor INTEGER NOT NULL DEFAULT 0,
    total_unknown INTEGER NOT NULL DEFAULT 0,
    last_updated TEXT DEFAULT CURRENT_TIMESTAMP
);
";

const INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_obs_event_id ON observer_notes(event_id);
CREATE INDEX IF NOT EXISTS idx_obs_z_bin ON observer_notes(z_bin);
CREATE INDEX IF NOT EXISTS idx_obs_session_id ON observer_notes(session_id);
CREATE INDEX IF NOT EXISTS idx_obs_record_status ON observer_notes(record_status);
CREATE INDEX IF NOT EXISTS idx_obs_supersedes_id ON observer_notes(supersedes_id);
CREATE INDEX IF NOT EXISTS idx_obs_system_address ON observer_notes(system_address);
CREATE INDEX IF NOT EXISTS idx_obs_system_name ON observer_notes(system_name);
CREATE INDEX IF NOT EXISTS idx_obs_survey_type ON observer_notes(survey_type);
CREATE INDEX IF NOT EXISTS idx_obs_sample ON observer_notes(z_bin, sample_index);
CREATE INDEX IF NOT EXISTS idx_candidates_event_id ON candidates(event_id);
CREATE INDEX IF NOT EXISTS idx_candidates_system_address ON candidates(system_address);
";

pub(crate) fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")
}

pub(crate) fn install_schema(conn: &Connection) -> rusqlite::Result<()> {
    let mut sql = String::new();
    sql.push_str(OBSERVER_NOTES);
    sql.push_str(BOXEL_ENTRIES);
    sql.push_str(CANDIDATES);
    sql.push_str(INDEXES);
    conn.execute_batch(&sql)
}

/// Rows written before the survey axis moved from Z to Y. Zero when the
/// table does not exist yet.
pub(crate) fn legacy_row_count(conn: &Connection) -> rusqlite::Result<i64> {
    let has_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'observer_notes'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_table {
        return Ok(0);
    }
    conn.query_row(
        "SELECT COUNT(*) FROM observer_notes WHERE schema_version = 1",
        [],
        |row| row.get(0),
    )
}
