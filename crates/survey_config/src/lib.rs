//! Configuration for the survey logger binaries.
//!
//! One file, YAML or JSON by extension, every section optional. Anything
//! left out takes its default, and a missing file is the same as an empty
//! one.

mod logging;

pub use logging::{init_logging, LogProfile};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use survey_core::rating::RatingConfig;

/// Overrides `paths.journal_dir` when set.
pub const JOURNAL_DIR_ENV: &str = "SURVEY_JOURNAL_DIR";

/// File names probed by [`find_config_file`], in order.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["config.yaml", "config.yml", "config.json"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub application: ApplicationConfig,
    pub paths: PathsConfig,
    pub rating: RatingConfig,
    pub monitoring: MonitoringConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub version: String,
    /// Replay the newest journal from its first line instead of tailing it.
    pub test_mode: bool,
    pub read_from_start: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "DW3 Survey Logger".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            test_mode: false,
            read_from_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Game journal folder. Unset means the game's default location.
    pub journal_dir: Option<PathBuf>,
    pub data_dir: PathBuf,
    /// Database file, relative to `data_dir` unless absolute.
    pub db_file: PathBuf,
    /// Unset means `<data_dir>/exports`.
    pub export_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            journal_dir: None,
            data_dir: PathBuf::from("data"),
            db_file: PathBuf::from("survey.db"),
            export_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Poll interval while journal lines keep arriving.
    pub poll_fast_seconds: f64,
    /// Poll interval once the journal goes quiet.
    pub poll_slow_seconds: f64,
    pub rotation_check_seconds: f64,
    /// How much of the newest journal is replayed to seed state at startup.
    pub journal_seed_max_bytes: u64,
    pub z_bin_size: i64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            poll_fast_seconds: 0.1,
            poll_slow_seconds: 0.25,
            rotation_check_seconds: 5.0,
            journal_seed_max_bytes: 2_000_000,
            z_bin_size: survey_core::Z_BIN_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Lines of monitor chatter kept for the diagnostics bundle.
    pub comms_max_lines: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            comms_max_lines: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// Where the game writes journals on a default install.
pub fn default_journal_dir() -> PathBuf {
    let home = dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("Saved Games")
        .join("Frontier Developments")
        .join("Elite Dangerous")
}

impl AppConfig {
    /// Journal folder: `SURVEY_JOURNAL_DIR`, then the config file, then the
    /// game's default.
    pub fn journal_dir(&self) -> PathBuf {
        self.journal_dir_with(std::env::var_os(JOURNAL_DIR_ENV))
    }

    fn journal_dir_with(&self, env_override: Option<OsString>) -> PathBuf {
        env_override
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.paths.journal_dir.clone())
            .unwrap_or_else(default_journal_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.paths.data_dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.paths.db_file)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.paths
            .export_dir
            .clone()
            .unwrap_or_else(|| self.paths.data_dir.join("exports"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.paths.data_dir.join("logger.log")
    }
}

// ---------------------------------------------------------------------------
// Load / save / validate
// ---------------------------------------------------------------------------

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Load `path`, or the defaults when it is `None` or does not exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let config = if is_yaml(path) {
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    };
    tracing::info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Write `config` as YAML or JSON, picked by the extension of `path`.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let text = if is_yaml(path) {
        serde_yaml::to_string(config).context("serializing config as YAML")?
    } else {
        serde_json::to_string_pretty(config).context("serializing config as JSON")?
    };
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// First `config.{yaml,yml,json}` found in `search_dirs`.
pub fn find_config_file(search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs
        .iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Every rule the config breaks; empty when it is usable.
pub fn validate_config(config: &AppConfig) -> Vec<String> {
    let mut errors = Vec::new();
    let r = &config.rating;
    let m = &config.monitoring;

    let ordered = [
        ("temp_a_min", r.temp_a_min, "temp_a_max", r.temp_a_max),
        ("temp_b_min", r.temp_b_min, "temp_b_max", r.temp_b_max),
        ("grav_a_min", r.grav_a_min, "grav_a_max", r.grav_a_max),
        ("grav_b_min", r.grav_b_min, "grav_b_max", r.grav_b_max),
        ("worth_temp_min", r.worth_temp_min, "worth_temp_max", r.worth_temp_max),
    ];
    for (low_name, low, high_name, high) in ordered {
        if low >= high {
            errors.push(format!("{low_name} must be less than {high_name}"));
        }
    }

    let positive = [
        ("worth_dist_max", r.worth_dist_max),
        ("worth_grav_max", r.worth_grav_max),
        ("poll_fast_seconds", m.poll_fast_seconds),
        ("poll_slow_seconds", m.poll_slow_seconds),
        ("rotation_check_seconds", m.rotation_check_seconds),
    ];
    for (name, value) in positive {
        if value.is_nan() || value <= 0.0 {
            errors.push(format!("{name} must be positive"));
        }
    }
    if m.journal_seed_max_bytes == 0 {
        errors.push("journal_seed_max_bytes must be positive".to_string());
    }
    if m.z_bin_size <= 0 {
        errors.push("z_bin_size must be positive".to_string());
    }
    if config.ui.comms_max_lines == 0 {
        errors.push("comms_max_lines must be positive".to_string());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&AppConfig::default()).is_empty());
    }

    #[test]
    fn env_override_wins() {
        let config = AppConfig {
            paths: PathsConfig {
                journal_dir: Some(PathBuf::from("/from/config")),
                ..PathsConfig::default()
            },
            ..AppConfig::default()
        };
        assert_eq!(
            config.journal_dir_with(Some(OsString::from("/from/env"))),
            PathBuf::from("/from/env")
        );
        assert_eq!(
            config.journal_dir_with(Some(OsString::new())),
            PathBuf::from("/from/config")
        );
        assert_eq!(config.journal_dir_with(None), PathBuf::from("/from/config"));
        assert!(AppConfig::default()
            .journal_dir_with(None)
            .ends_with("Elite Dangerous"));
    }

    #[test]
    fn derived_paths_follow_data_dir() {
        let config = AppConfig {
            paths: PathsConfig {
                data_dir: PathBuf::from("/srv/survey"),
                ..PathsConfig::default()
            },
            ..AppConfig::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/srv/survey/survey.db"));
        assert_eq!(config.export_dir(), PathBuf::from("/srv/survey/exports"));
        assert_eq!(config.log_path(), PathBuf::from("/srv/survey/logger.log"));
    }
}
