//! Journal file discovery and incremental line reading.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use survey_core::{parse_line, JournalEvent};

/// Name used when a journal never mentions its commander.
pub const UNKNOWN_CMDR: &str = "Unknown";

fn is_journal_name(name: &str) -> bool {
    name.starts_with("Journal.") && name.ends_with(".log")
}

/// `Journal.*.log` files in `dir`, oldest modification first. An unreadable
/// directory has no journals.
pub fn list_journals(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut journals: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_str().is_some_and(is_journal_name))
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            meta.is_file()
                .then(|| (meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), entry.path()))
        })
        .collect();
    journals.sort();
    journals.into_iter().map(|(_, path)| path).collect()
}

struct OpenJournal {
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes of a line the game has not finished writing yet.
    partial: Vec<u8>,
}

pub struct JournalReader {
    journal_dir: PathBuf,
    seed_max_bytes: u64,
    current: Option<OpenJournal>,
}

impl JournalReader {
    pub fn new(journal_dir: impl Into<PathBuf>, seed_max_bytes: u64) -> Self {
        Self {
            journal_dir: journal_dir.into(),
            seed_max_bytes,
            current: None,
        }
    }

    pub fn journal_dir(&self) -> &Path {
        &self.journal_dir
    }

    /// Point at a different folder. Closes whatever was open.
    pub fn set_journal_dir(&mut self, journal_dir: impl Into<PathBuf>) {
        self.close();
        self.journal_dir = journal_dir.into();
    }

    pub fn find_newest_journal(&self) -> Option<PathBuf> {
        list_journals(&self.journal_dir).pop()
    }

    pub fn find_all_journals(&self) -> Vec<PathBuf> {
        list_journals(&self.journal_dir)
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current.as_ref().map(|open| open.path.as_path())
    }

    /// Open `path`, positioned at its start or its end.
    pub fn open(&mut self, path: &Path, from_start: bool) -> io::Result<()> {
        self.close();
        let mut file = File::open(path)?;
        if !from_start {
            file.seek(SeekFrom::End(0))?;
        }
        self.current = Some(OpenJournal {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            partial: Vec::new(),
        });
        Ok(())
    }

    /// Next complete line, or `None` when nothing new has been written.
    /// A trailing fragment without a newline is held back until the rest
    /// of the line arrives.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let Some(open) = self.current.as_mut() else {
            return Ok(None);
        };
        let read = open.reader.read_until(b'\n', &mut open.partial)?;
        if read == 0 || open.partial.last() != Some(&b'\n') {
            return Ok(None);
        }
        let bytes = std::mem::take(&mut open.partial);
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// True when nothing is open or the open file has disappeared.
    pub fn is_rotated(&self) -> bool {
        self.current.as_ref().is_none_or(|open| !open.path.exists())
    }

    /// State-bearing events (Commander, LoadGame, Location, FSDJump) from
    /// the first `seed_max_bytes` of `path`.
    pub fn seed_initial_state(&self, path: &Path) -> io::Result<Vec<JournalEvent>> {
        let mut head = Vec::new();
        File::open(path)?
            .take(self.seed_max_bytes)
            .read_to_end(&mut head)?;
        Ok(String::from_utf8_lossy(&head)
            .lines()
            .filter_map(parse_line)
            .filter(|event| event.kind().seeds_state())
            .collect())
    }

    pub fn close(&mut self) {
        self.current = None;
    }
}

/// First commander named by a Commander or LoadGame event in `path`, or
/// [`UNKNOWN_CMDR`].
pub fn extract_cmdr_name(path: &Path) -> String {
    let Ok(file) = File::open(path) else {
        return UNKNOWN_CMDR.to_string();
    };
    BufReader::new(file)
        .split(b'\n')
        .map_while(Result::ok)
        .filter_map(|line| parse_line(&String::from_utf8_lossy(&line)))
        .filter(|event| {
            matches!(
                event.kind(),
                survey_core::EventKind::Commander | survey_core::EventKind::LoadGame
            )
        })
        .find_map(|event| event.commander_name().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_CMDR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_lines_wait_for_their_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Journal.2026-01-01T000000.01.log");
        std::fs::write(&path, "").unwrap();

        let mut reader = JournalReader::new(dir.path(), 1024);
        reader.open(&path, true).unwrap();
        assert_eq!(reader.read_line().unwrap(), None);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"timestamp":"t","#).unwrap();
        file.flush().unwrap();
        assert_eq!(reader.read_line().unwrap(), None);

        file.write_all(b"\"event\":\"Music\"}\n").unwrap();
        file.flush().unwrap();
        assert_eq!(
            reader.read_line().unwrap().as_deref(),
            Some("{\"timestamp\":\"t\",\"event\":\"Music\"}\n")
        );
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn tail_mode_skips_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Journal.a.log");
        std::fs::write(&path, "old line\n").unwrap();

        let mut reader = JournalReader::new(dir.path(), 1024);
        reader.open(&path, false).unwrap();
        assert_eq!(reader.read_line().unwrap(), None);
        assert!(!reader.is_rotated());

        std::fs::remove_file(&path).unwrap();
        assert!(reader.is_rotated());
        reader.close();
        assert!(reader.is_rotated());
    }

    #[test]
    fn only_journal_files_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Journal.one.log"), "").unwrap();
        std::fs::write(dir.path().join("Status.json"), "").unwrap();
        std::fs::write(dir.path().join("Journal.two.txt"), "").unwrap();
        let found = list_journals(dir.path());
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("Journal.one.log"));
        assert!(list_journals(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn seeding_respects_byte_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Journal.a.log");
        let first = r#"{"timestamp":"t","event":"LoadGame","Commander":"Jameson"}"#;
        let second = r#"{"timestamp":"t","event":"FSDJump","StarSystem":"Sol"}"#;
        std::fs::write(&path, format!("{first}\n{second}\n")).unwrap();

        let reader = JournalReader::new(dir.path(), (first.len() + 1) as u64);
        let seeded = reader.seed_initial_state(&path).unwrap();
        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded[0].name(), "LoadGame");

        assert_eq!(extract_cmdr_name(&path), "Jameson");
        assert_eq!(extract_cmdr_name(&dir.path().join("missing.log")), UNKNOWN_CMDR);
    }
}
