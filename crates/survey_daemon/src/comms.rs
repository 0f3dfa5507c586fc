use std::collections::VecDeque;

use parking_lot::Mutex;
use survey_journal::{MonitorEvent, ReadMode};

/// The last few human-readable monitor messages, oldest first.
pub struct CommsLog {
    lines: Mutex<VecDeque<String>>,
    max_lines: usize,
}

impl CommsLog {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(max_lines)),
            max_lines: max_lines.max(1),
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let stamped = format!("[{}] {}", chrono::Utc::now().format("%H:%M:%S"), line.into());
        let mut lines = self.lines.lock();
        lines.push_back(stamped);
        while lines.len() > self.max_lines {
            lines.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}

/// One line for the comms panel.
pub fn describe(event: &MonitorEvent) -> String {
    match event {
        MonitorEvent::JournalOpened { file, mode } => match mode {
            ReadMode::Tail => format!("Tailing {file}"),
            ReadMode::FromStart => format!("Reading {file} from the start"),
        },
        MonitorEvent::JournalRotated { file } => format!("New journal: {file}"),
        MonitorEvent::CommanderChanged { cmdr_name } => format!("CMDR {cmdr_name}"),
        MonitorEvent::Jumped {
            system_name,
            first_visit,
            systems_visited,
        } => {
            let visit = if *first_visit { "new" } else { "revisit" };
            format!("Jumped to {system_name} ({visit}, {systems_visited} this session)")
        }
        MonitorEvent::ZBinChanged(change) => format!(
            "Z-bin {} -> {} at {}",
            change.old_z_bin, change.new_z_bin, change.system_name
        ),
        MonitorEvent::BodyScanned { body_name, .. } => format!("Scanned {body_name}"),
        MonitorEvent::CandidateLogged { candidate, was_new } => {
            let seen = if *was_new { "" } else { " (already logged)" };
            format!(
                "{}: {} {}{seen}",
                candidate.candidate_type, candidate.body_name, candidate.earth2_rating
            )
        }
        MonitorEvent::RescanComplete {
            files,
            new_candidates,
        } => format!("Rescan done: {files} journals, {new_candidates} new candidates"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest_lines() {
        let comms = CommsLog::new(2);
        comms.push("one");
        comms.push("two");
        comms.push("three");
        let lines = comms.snapshot();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("two"));
        assert!(lines[1].ends_with("three"));
    }

    #[test]
    fn describes_jumps() {
        let line = describe(&MonitorEvent::Jumped {
            system_name: "Alpha".to_string(),
            first_visit: true,
            systems_visited: 3,
        });
        assert_eq!(line, "Jumped to Alpha (new, 3 this session)");
    }
}
