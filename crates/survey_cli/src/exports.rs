//! `export` and `diagnostics` subcommands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use survey_config::AppConfig;
use survey_core::SurveyType;
use survey_export::{
    export_boxel_sheet, export_density_worksheets, export_diagnostics_zip, export_notes_csv,
    export_spreadsheet_csv, DensityExport, DiagnosticsInput,
};
use survey_journal::{extract_cmdr_name, JournalReader, UNKNOWN_CMDR};
use survey_store::SurveyStore;

#[derive(Subcommand)]
pub enum ExportCommand {
    /// One density worksheet per completed sample.
    Density {
        /// Defaults to every density survey type.
        #[arg(long)]
        survey_type: Option<SurveyType>,
        #[arg(long, allow_hyphen_values = true)]
        z_bin: Option<i64>,
        /// Defaults to the commander in the newest journal.
        #[arg(long)]
        cmdr: Option<String>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// The boxel-size sheet.
    Boxel {
        #[arg(long)]
        cmdr: Option<String>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Active observations in spreadsheet column order.
    Csv { path: PathBuf },
    /// Every stored row with its chain hashes.
    Raw { path: PathBuf },
}

fn resolve_cmdr(config: &AppConfig, cmdr: Option<String>) -> String {
    if let Some(cmdr) = cmdr {
        return cmdr;
    }
    let reader = JournalReader::new(
        config.journal_dir(),
        config.monitoring.journal_seed_max_bytes,
    );
    reader
        .find_newest_journal()
        .map(|path| extract_cmdr_name(&path))
        .filter(|name| name != UNKNOWN_CMDR)
        .unwrap_or_default()
}

fn output_dir(config: &AppConfig, out_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = out_dir.unwrap_or_else(|| config.export_dir());
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(dir)
}

pub fn run_export(config: &AppConfig, store: &SurveyStore, command: ExportCommand) -> Result<()> {
    match command {
        ExportCommand::Density {
            survey_type,
            z_bin,
            cmdr,
            out_dir,
        } => {
            let cmdr_name = resolve_cmdr(config, cmdr);
            let output_dir = output_dir(config, out_dir)?;
            let files = export_density_worksheets(
                &store.get_all_active()?,
                &DensityExport {
                    cmdr_name: &cmdr_name,
                    survey_type,
                    z_bin,
                    output_dir: &output_dir,
                },
            )?;
            for file in files {
                println!("{}", file.display());
            }
        }
        ExportCommand::Boxel { cmdr, out_dir } => {
            let cmdr_name = resolve_cmdr(config, cmdr);
            let output_dir = output_dir(config, out_dir)?;
            let notes = store.get_all_active()?;
            let entries = store.get_boxel_entries(false)?;
            match export_boxel_sheet(&notes, &entries, &cmdr_name, &output_dir)? {
                Some(path) => println!("{}", path.display()),
                None => println!("no boxel entries to export"),
            }
        }
        ExportCommand::Csv { path } => {
            let rows = export_spreadsheet_csv(&store.get_all_active()?, &path)?;
            println!("{rows} rows -> {}", path.display());
        }
        ExportCommand::Raw { path } => {
            let rows = export_notes_csv(&store.get_all_notes()?, &path)?;
            println!("{rows} rows -> {}", path.display());
        }
    }
    Ok(())
}

pub fn run_diagnostics(
    config: &AppConfig,
    config_path: Option<&Path>,
    output: Option<PathBuf>,
    include_db: bool,
) -> Result<()> {
    let output = output.unwrap_or_else(|| {
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        config.export_dir().join(format!("diagnostics_{stamp}.zip"))
    });
    let db_path = config.db_path();
    let store = if db_path.is_file() {
        Some(
            SurveyStore::open(&db_path)
                .with_context(|| format!("opening {}", db_path.display()))?,
        )
    } else {
        None
    };
    let path = export_diagnostics_zip(
        &output,
        &DiagnosticsInput {
            config,
            config_path,
            store: store.as_ref(),
            comms: &[],
            status: None,
            include_db,
        },
    )?;
    println!("{}", path.display());
    Ok(())
}
