use survey_journal::JournalMonitor;
use tracing::error;

use crate::comms::describe;
use crate::state::AppState;

/// Drive the monitor until it is stopped, publishing what it reports.
pub async fn run_monitor_loop(mut monitor: JournalMonitor, app: AppState) {
    let control = monitor.control();
    while !control.is_stopped() {
        match monitor.tick() {
            Ok(events) => {
                for event in &events {
                    app.comms.push(describe(event));
                }
                if !events.is_empty() {
                    let _ = app.event_tx.send(events);
                }
            }
            Err(err) => {
                error!("monitor tick failed: {err:#}");
                app.comms.push(format!("Monitor error: {err:#}"));
            }
        }
        *app.status.lock() = monitor.status();
        tokio::time::sleep(monitor.poll_delay()).await;
    }

    if let Err(err) = monitor.shutdown() {
        error!("monitor shutdown failed: {err:#}");
    }
    *app.status.lock() = monitor.status();
}
