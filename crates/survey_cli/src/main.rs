mod exports;
mod notes;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use survey_config::{
    find_config_file, init_logging, load_config, save_config, validate_config, AppConfig,
    LogProfile,
};
use survey_core::SurveyType;
use survey_journal::import_journals;
use survey_store::SurveyStore;
use tracing::{info, warn};

use exports::ExportCommand;
use notes::{BoxelCommand, NoteCommand};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "survey_cli", about = "DW3 survey logger")]
struct Cli {
    /// Config file, YAML or JSON. Defaults to the first config.* in the working directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Also write logs to <data_dir>/logger.log.
    #[arg(long, global = true)]
    log_file: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record, correct and inspect observations.
    Note {
        #[command(subcommand)]
        command: NoteCommand,
    },
    /// Boxel-size survey entries.
    Boxel {
        #[command(subcommand)]
        command: BoxelCommand,
    },
    /// Sample progress at a bin, or row totals when no bin is given.
    Counts {
        #[arg(long, allow_hyphen_values = true)]
        z_bin: Option<i64>,
        #[arg(long, default_value = "regular_density")]
        survey_type: SurveyType,
    },
    /// Retire active observations so sample numbering starts over.
    Reset {
        /// Only this bin. Without it every bin is reset.
        #[arg(long, allow_hyphen_values = true)]
        z_bin: Option<i64>,
        #[arg(long)]
        survey_type: Option<SurveyType>,
        /// Required; resets cannot be undone.
        #[arg(long)]
        yes: bool,
    },
    /// Walk the observation hash chain. Exits non-zero when it is broken.
    Verify,
    /// Back-fill candidates from old journals.
    Import {
        /// Defaults to the configured journal folder.
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Only this commander's sessions.
        #[arg(long)]
        cmdr: Option<String>,
    },
    /// Write survey files for submission or for your own records.
    Export {
        #[command(subcommand)]
        command: ExportCommand,
    },
    /// Bundle settings, logs and the database into a zip for a bug report.
    Diagnostics {
        /// Defaults to <export_dir>/diagnostics_<timestamp>.zip.
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_db: bool,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Report every invalid setting.
    Check,
    /// Print the effective configuration.
    Show,
    /// Write a config file with every default spelled out.
    Init {
        #[arg(default_value = "config.yaml")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn config_path(cli_config: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_config {
        return Ok(Some(path.to_path_buf()));
    }
    let cwd = std::env::current_dir().context("resolving working directory")?;
    Ok(find_config_file(&[cwd]))
}

fn open_store(config: &AppConfig) -> Result<SurveyStore> {
    let path = config.db_path();
    SurveyStore::open(&path).with_context(|| format!("opening {}", path.display()))
}

fn counts(store: &SurveyStore, z_bin: Option<i64>, survey_type: SurveyType) -> Result<()> {
    let report = match z_bin {
        Some(z_bin) => serde_json::json!({
            "z_bin": z_bin,
            "survey_type": survey_type,
            "counts": store.sample_counts(z_bin, survey_type)?,
        }),
        None => serde_json::json!({
            "notes_by_status": store.count_by_status()?,
            "active_by_slice_status": store.count_by_slice_status(true)?,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn reset(
    store: &SurveyStore,
    z_bin: Option<i64>,
    survey_type: Option<SurveyType>,
    yes: bool,
) -> Result<()> {
    if !yes {
        bail!("reset retires observations for good; pass --yes to go ahead");
    }
    let affected = match z_bin {
        Some(z_bin) => {
            store.reset_sample_progress(z_bin, survey_type.unwrap_or_default())?
        }
        None => store.reset_all_progress(survey_type)?,
    };
    println!("retired {affected} observations");
    Ok(())
}

fn verify(store: &SurveyStore) -> Result<()> {
    let report = store.verify_integrity()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.valid {
        bail!(
            "hash chain broken after {}",
            report.last_good_id.as_deref().unwrap_or("the first row")
        );
    }
    Ok(())
}

fn run_config(config: &AppConfig, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Check => {
            let errors = validate_config(config);
            if !errors.is_empty() {
                for error in &errors {
                    println!("{error}");
                }
                bail!("{} invalid setting(s)", errors.len());
            }
            println!("configuration ok");
        }
        ConfigCommand::Show => println!("{}", serde_json::to_string_pretty(config)?),
        ConfigCommand::Init { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", path.display());
            }
            save_config(&AppConfig::default(), &path)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn run(cli: Cli, config: &AppConfig, config_path: Option<&Path>) -> Result<()> {
    match cli.command {
        Commands::Config { command } => run_config(config, command),
        Commands::Diagnostics { output, no_db } => {
            exports::run_diagnostics(config, config_path, output, !no_db)
        }
        Commands::Note { command } => notes::run_note(config, &open_store(config)?, command),
        Commands::Boxel { command } => notes::run_boxel(config, &open_store(config)?, command),
        Commands::Counts { z_bin, survey_type } => {
            counts(&open_store(config)?, z_bin, survey_type)
        }
        Commands::Reset {
            z_bin,
            survey_type,
            yes,
        } => reset(&open_store(config)?, z_bin, survey_type, yes),
        Commands::Verify => verify(&open_store(config)?),
        Commands::Import { dir, cmdr } => {
            let dir = dir.unwrap_or_else(|| config.journal_dir());
            let store = open_store(config)?;
            let stats = import_journals(&dir, &store, cmdr.as_deref(), &config.rating);
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Export { command } => {
            exports::run_export(config, &open_store(config)?, command)
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = config_path(cli.config.as_deref())?;
    let config = load_config(config_path.as_deref())?;
    let log_file = cli.log_file.then(|| config.log_path());
    let _log_guard = init_logging(LogProfile::Cli, log_file.as_deref())?;

    if let Some(path) = &config_path {
        info!(path = %path.display(), "using config");
    }
    for problem in validate_config(&config) {
        warn!("config: {problem}");
    }
    run(cli, &config, config_path.as_deref())
}
