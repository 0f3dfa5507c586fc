use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use survey_config::AppConfig;
use survey_core::JournalStateManager;
use survey_journal::{MonitorControl, MonitorEvent, MonitorStatus};
use survey_store::SurveyStore;
use tokio::sync::broadcast;

use crate::comms::CommsLog;

pub type EventTx = broadcast::Sender<Vec<MonitorEvent>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub config_path: Option<PathBuf>,
    pub store: Arc<SurveyStore>,
    pub journal: Arc<JournalStateManager>,
    pub control: Arc<MonitorControl>,
    /// Refreshed by the monitor loop after every tick.
    pub status: Arc<Mutex<MonitorStatus>>,
    pub comms: Arc<CommsLog>,
    pub event_tx: EventTx,
}
