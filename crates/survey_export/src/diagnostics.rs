//! Support bundle: a zip with a manifest, the settings, the log tail and
//! optionally the database files.
//!
//! Paths in the manifest have the home directory replaced by `<HOME>`.
//! Optional files that are missing are noted in the manifest instead of
//! failing the export.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use survey_config::AppConfig;
use survey_store::{sidecar_path, SurveyStore};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::atomic::tmp_path;
use crate::error::{io_error, ExportResult};

/// Everything the bundle is built from.
pub struct DiagnosticsInput<'a> {
    pub config: &'a AppConfig,
    pub config_path: Option<&'a Path>,
    /// Integrity and note counts come from here when present.
    pub store: Option<&'a SurveyStore>,
    /// Recent monitor messages, oldest first.
    pub comms: &'a [String],
    /// Free-form status snapshot from the running front end.
    pub status: Option<Value>,
    pub include_db: bool,
}

/// Replace the home directory prefix with `<HOME>`.
pub fn redact_path(path: &str, home: Option<&Path>) -> String {
    match home.map(|h| h.to_string_lossy()) {
        Some(home) if !home.is_empty() => path.replace(home.as_ref(), "<HOME>"),
        _ => path.to_string(),
    }
}

fn platform() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

fn store_sections(store: &SurveyStore, notes: &mut Vec<String>) -> (Value, Value) {
    let integrity = match store.verify_integrity() {
        Ok(report) => serde_json::to_value(report).unwrap_or(Value::Null),
        Err(err) => {
            notes.push(format!("Integrity check failed: {err}"));
            Value::Null
        }
    };
    let mut stats = serde_json::Map::new();
    match store.count_by_status() {
        Ok(counts) => {
            stats.insert("notes_by_status".to_string(), json!(counts));
        }
        Err(err) => notes.push(format!("Note counts unavailable: {err}")),
    }
    match store.get_all_cmdr_stats() {
        Ok(cmdrs) => {
            stats.insert("commanders".to_string(), json!(cmdrs));
        }
        Err(err) => notes.push(format!("Commander stats unavailable: {err}")),
    }
    (Value::Object(stats), integrity)
}

fn manifest(input: &DiagnosticsInput<'_>, notes: &mut Vec<String>) -> Value {
    let home = dirs::home_dir();
    let redact = |p: &Path| redact_path(&p.display().to_string(), home.as_deref());
    let config = input.config;
    let cwd = std::env::current_dir()
        .map(|p| redact(&p))
        .unwrap_or_default();

    let (stats, integrity) = match input.store {
        Some(store) => store_sections(store, notes),
        None => (json!({}), Value::Null),
    };

    json!({
        "generated_utc": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "app_name": config.application.name,
        "app_version": config.application.version,
        "platform": platform(),
        "cwd": cwd,
        "paths": {
            "config": input.config_path.map(redact),
            "data_dir": redact(config.data_dir()),
            "export_dir": redact(&config.export_dir()),
            "journal_dir": redact(&config.journal_dir()),
            "db_path": redact(&config.db_path()),
            "logfile": redact(&config.log_path()),
        },
        "settings": {
            "monitoring": config.monitoring,
            "comms_max_lines": config.ui.comms_max_lines,
            "test_mode": config.application.test_mode,
        },
        "stats": stats,
        "status": input.status,
        "integrity": integrity,
    })
}

struct Bundle<W: Write + std::io::Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
}

impl<W: Write + std::io::Seek> Bundle<W> {
    fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> ExportResult<()> {
        self.zip.start_file(name, self.options)?;
        self.zip
            .write_all(bytes)
            .map_err(io_error("writing bundle entry", Path::new(name)))?;
        Ok(())
    }

    /// Copy `src` into the bundle; `false` when it does not exist.
    fn add_file(&mut self, name: &str, src: &Path) -> ExportResult<bool> {
        if !src.is_file() {
            debug!(path = %src.display(), "not bundled, missing");
            return Ok(false);
        }
        let mut file = File::open(src).map_err(io_error("opening", src))?;
        self.zip.start_file(name, self.options)?;
        std::io::copy(&mut file, &mut self.zip).map_err(io_error("copying", src))?;
        Ok(true)
    }
}

/// Write the bundle to `zip_path` and return it.
pub fn export_diagnostics_zip(zip_path: &Path, input: &DiagnosticsInput<'_>) -> ExportResult<PathBuf> {
    if let Some(parent) = zip_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error("creating", parent))?;
    }
    let tmp = tmp_path(zip_path);
    let file = File::create(&tmp).map_err(io_error("creating", &tmp))?;
    let mut bundle = Bundle {
        zip: ZipWriter::new(file),
        options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
    };
    let mut notes = vec!["Paths are redacted to <HOME> for safer sharing.".to_string()];

    let settings = serde_json::to_vec_pretty(input.config)?;
    bundle.add_bytes("settings.json", &settings)?;

    if !bundle.add_file("logger.log", &input.config.log_path())? {
        notes.push("logger.log not found".to_string());
    }

    let keep = input.config.ui.comms_max_lines;
    let tail = &input.comms[input.comms.len().saturating_sub(keep)..];
    bundle.add_bytes("comms_tail.txt", tail.join("\n").as_bytes())?;

    if input.include_db {
        let db = input.config.db_path();
        let name = db
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "survey.db".to_string());
        if bundle.add_file(&format!("db/{name}"), &db)? {
            for suffix in ["-wal", "-shm"] {
                bundle.add_file(&format!("db/{name}{suffix}"), &sidecar_path(&db, suffix))?;
            }
        } else {
            notes.push(format!("Database {name} not found"));
        }
    } else {
        notes.push("Database files were not included.".to_string());
    }

    let mut manifest = manifest(input, &mut notes);
    manifest["notes"] = json!(notes);
    bundle.add_bytes("manifest.json", &serde_json::to_vec_pretty(&manifest)?)?;

    let file = bundle.zip.finish()?;
    file.sync_all().map_err(io_error("syncing", &tmp))?;
    std::fs::rename(&tmp, zip_path).map_err(io_error("renaming", &tmp))?;
    info!(path = %zip_path.display(), "diagnostics bundle written");
    Ok(zip_path.to_path_buf())
}
