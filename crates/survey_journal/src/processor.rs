use serde::Serialize;
use survey_core::{parse_line, EventKind, JournalEvent, JournalStateManager};

/// Where an event goes after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Commander,
    Location,
    /// FSDJump: a position update that also counts as a jump.
    Jump,
    Scan,
    SaaScanComplete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    pub events_processed: u64,
    pub events_skipped: u64,
}

/// Parses raw journal lines and decides which handler each event needs.
#[derive(Debug, Default)]
pub struct EventProcessor {
    stats: ProcessorStats,
}

impl EventProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one line. Blank lines are ignored without counting; anything
    /// else that fails to parse counts as skipped.
    pub fn parse_line(&mut self, line: &str) -> Option<JournalEvent> {
        if line.trim().is_empty() {
            return None;
        }
        match parse_line(line) {
            Some(event) => {
                self.stats.events_processed += 1;
                Some(event)
            }
            None => {
                self.stats.events_skipped += 1;
                None
            }
        }
    }

    /// Commander events without a name go nowhere.
    pub fn route(event: &JournalEvent) -> Option<Routed> {
        match event.kind() {
            EventKind::Commander | EventKind::LoadGame => {
                event.commander_name().map(|_| Routed::Commander)
            }
            EventKind::Location => Some(Routed::Location),
            EventKind::FsdJump => Some(Routed::Jump),
            EventKind::Scan => Some(Routed::Scan),
            EventKind::SaaScanComplete => Some(Routed::SaaScanComplete),
            EventKind::Other => None,
        }
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }
}

/// Feed an event straight into the state manager, with no store or
/// session side effects. Used to rebuild context from a journal offline.
pub fn apply_to_state(state: &JournalStateManager, event: &JournalEvent) {
    match EventProcessor::route(event) {
        Some(Routed::Commander) => state.on_commander(event),
        Some(Routed::Location) => state.on_location(event),
        Some(Routed::Jump) => state.on_fsd_jump(event),
        Some(Routed::Scan) => state.on_scan(event),
        Some(Routed::SaaScanComplete) | None => {}
    }
}
