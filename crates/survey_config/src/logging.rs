//! Subscriber setup shared by the CLI and the daemon.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Which binary is logging. Decides how much detail each line carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogProfile {
    /// Short console lines without targets.
    Cli,
    /// Targets on the console, thread ids in the file.
    Daemon,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Directory and file name the appender writes to.
fn split_log_path(path: &Path) -> Result<(&Path, &OsStr)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("log file {} has no file name", path.display()))?;
    Ok((dir, name))
}

/// Log to stderr, and to `log_file` as well when given. The file is what
/// the diagnostics bundle picks up as `logger.log`. Keep the returned guard
/// alive until exit so buffered lines are flushed.
pub fn init_logging(profile: LogProfile, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let daemon = profile == LogProfile::Daemon;
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(daemon);
    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(console)
            .init();
        return Ok(None);
    };

    let (dir, name) = split_log_path(path)?;
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy().into_owned())
        .build(dir)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_thread_ids(daemon)
                .with_ansi(false),
        )
        .init();
    Ok(Some(guard))
}
