mod comms;
mod monitor_loop;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use survey_config::{find_config_file, init_logging, load_config, validate_config, LogProfile};
use survey_core::JournalStateManager;
use survey_journal::{JournalMonitor, MonitorControl, MonitorSettings};
use survey_store::SurveyStore;
use tokio::sync::broadcast;
use tracing::{error, info};

use comms::CommsLog;
use state::AppState;

#[derive(Parser)]
#[command(name = "survey_daemon", about = "DW3 survey logger: journal monitor and HTTP API")]
struct Cli {
    /// Config file, YAML or JSON. Defaults to the first config.* in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 3002)]
    port: u16,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Also write logs to <data_dir>/logger.log.
    #[arg(long)]
    log_file: bool,
    /// Watch this journal folder instead of the configured one.
    #[arg(long)]
    journal_dir: Option<PathBuf>,
}

async fn shutdown_signal(control: Arc<MonitorControl>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("listening for ctrl-c failed: {err}");
    }
    info!("shutting down");
    control.stop();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => Some(path),
        None => find_config_file(&[std::env::current_dir().context("resolving working directory")?]),
    };
    let mut config = load_config(config_path.as_deref())?;
    if let Some(dir) = cli.journal_dir {
        config.paths.journal_dir = Some(dir);
    }
    let log_file = cli.log_file.then(|| config.log_path());
    let _log_guard = init_logging(LogProfile::Daemon, log_file.as_deref())?;

    let problems = validate_config(&config);
    if !problems.is_empty() {
        for problem in &problems {
            error!("config: {problem}");
        }
        bail!("invalid configuration ({} problem(s))", problems.len());
    }

    let db_path = config.db_path();
    let store = Arc::new(
        SurveyStore::open(&db_path).with_context(|| format!("opening {}", db_path.display()))?,
    );
    let journal = Arc::new(JournalStateManager::new(config.monitoring.z_bin_size));
    let monitor = JournalMonitor::new(
        MonitorSettings::from_config(&config),
        Arc::clone(&journal),
        Arc::clone(&store),
    );
    info!(
        journal_dir = %config.journal_dir().display(),
        db = %db_path.display(),
        "survey daemon starting"
    );

    let (event_tx, _) = broadcast::channel(256);
    let app_state = AppState {
        comms: Arc::new(CommsLog::new(config.ui.comms_max_lines)),
        config: Arc::new(config),
        config_path,
        store,
        journal,
        control: monitor.control(),
        status: Arc::new(Mutex::new(monitor.status())),
        event_tx,
    };

    let monitor_task = tokio::spawn(monitor_loop::run_monitor_loop(monitor, app_state.clone()));

    let router = routes::make_router_with_cors(app_state.clone(), &cli.cors_origin)?;
    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&app_state.control)))
        .await
        .context("serving HTTP")?;

    app_state.control.stop();
    monitor_task.await.context("joining monitor loop")?;
    Ok(())
}
