use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use survey_core::JournalStateManager;
use survey_journal::{JournalMonitor, MonitorEvent, MonitorSettings, ScanStatus};
use survey_store::SurveyStore;

const LOAD_ALICE: &str =
    r#"{"timestamp":"2026-01-01T00:00:00Z","event":"LoadGame","Commander":"Alice"}"#;
const LOCATION: &str = r#"{"timestamp":"2026-01-01T00:00:01Z","event":"Location","StarSystem":"Start","SystemAddress":1,"StarPos":[0.0,100.0,0.0]}"#;
const JUMP: &str = r#"{"timestamp":"2026-01-01T00:01:00Z","event":"FSDJump","StarSystem":"Higher","SystemAddress":2,"StarPos":[0.0,160.0,0.0]}"#;
const SCAN_ELW: &str = r#"{"timestamp":"2026-01-01T00:02:00Z","event":"Scan","BodyName":"Higher 1","BodyID":1,"PlanetClass":"Earthlike body","TerraformState":"","SurfaceTemperature":288.0,"SurfaceGravity":9.80665,"DistanceFromArrivalLS":300.0}"#;

fn settings(dir: &Path) -> MonitorSettings {
    MonitorSettings {
        journal_dir: dir.to_path_buf(),
        poll_fast: Duration::from_millis(10),
        poll_slow: Duration::from_millis(50),
        rotation_check: Duration::from_secs(3600),
        seed_max_bytes: 1_000_000,
        from_start: false,
        rating: survey_core::rating::RatingConfig::default(),
    }
}

/// Write a journal with an explicit modification time so ordering never
/// depends on filesystem timestamp resolution.
fn write_journal(dir: &Path, name: &str, lines: &[&str], age_secs: u64) -> PathBuf {
    let path = dir.join(name);
    let mut text = lines.join("\n");
    text.push('\n');
    std::fs::write(&path, text).unwrap();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
    path
}

fn append(path: &Path, lines: &[&str]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn monitor(dir: &Path) -> (JournalMonitor, Arc<JournalStateManager>, Arc<SurveyStore>) {
    let state = Arc::new(JournalStateManager::default());
    let store = Arc::new(SurveyStore::open_in_memory().unwrap());
    let monitor = JournalMonitor::new(settings(dir), Arc::clone(&state), Arc::clone(&store));
    (monitor, state, store)
}

#[test]
fn initialize_seeds_state_and_starts_session() {
    let dir = tempfile::tempdir().unwrap();
    write_journal(dir.path(), "Journal.2026-01-01T000000.01.log", &[LOAD_ALICE, LOCATION], 10);
    let (mut monitor, state, _store) = monitor(dir.path());

    let events = monitor.tick().unwrap();
    assert!(events.contains(&MonitorEvent::CommanderChanged {
        cmdr_name: "Alice".to_string()
    }));
    assert!(matches!(events.last(), Some(MonitorEvent::JournalOpened { .. })));

    let context = state.context();
    assert_eq!(context.system_name.as_deref(), Some("Start"));
    assert_eq!(context.z_bin, 100);
    assert_eq!(context.cmdr_name.as_deref(), Some("Alice"));
    assert!(context.session_id.unwrap().starts_with("Alice_"));

    let status = monitor.status();
    assert_eq!(status.scan_status, ScanStatus::Armed);
    assert_eq!(
        status.journal_file.as_deref(),
        Some("Journal.2026-01-01T000000.01.log")
    );
}

#[test]
fn new_lines_produce_jump_zbin_scan_and_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let journal =
        write_journal(dir.path(), "Journal.2026-01-01T000000.01.log", &[LOAD_ALICE, LOCATION], 10);
    let (mut monitor, _state, store) = monitor(dir.path());
    monitor.tick().unwrap();

    append(&journal, &[JUMP, SCAN_ELW]);
    let events = monitor.tick().unwrap();

    assert!(events.contains(&MonitorEvent::Jumped {
        system_name: "Higher".to_string(),
        first_visit: true,
        systems_visited: 1,
    }));
    let change = events
        .iter()
        .find_map(|e| match e {
            MonitorEvent::ZBinChanged(change) => Some(change),
            _ => None,
        })
        .expect("z-bin change");
    assert_eq!((change.old_z_bin, change.new_z_bin), (100, 150));
    assert!(events.contains(&MonitorEvent::BodyScanned {
        body_name: "Higher 1".to_string(),
        bodies_scanned: 1,
    }));
    let candidate = events
        .iter()
        .find_map(|e| match e {
            MonitorEvent::CandidateLogged { candidate, was_new } => Some((candidate, *was_new)),
            _ => None,
        })
        .expect("candidate");
    assert!(candidate.1);
    assert_eq!(candidate.0.star_system, "Higher");
    assert_eq!(candidate.0.cmdr_name, "Alice");
    assert_eq!(candidate.0.star_pos, [0.0, 160.0, 0.0]);

    let stats = store.get_cmdr_stats("Alice").unwrap().unwrap();
    assert_eq!(stats.total_elw, 1);
    assert_eq!(monitor.status().scan_status, ScanStatus::Active);
    assert_eq!(monitor.status().candidates_logged, 1);
}

#[test]
fn pause_holds_lines_until_resume() {
    let dir = tempfile::tempdir().unwrap();
    let journal = write_journal(dir.path(), "Journal.2026-01-01T000000.01.log", &[LOAD_ALICE], 10);
    let (mut monitor, _state, _store) = monitor(dir.path());
    monitor.tick().unwrap();

    let control = monitor.control();
    control.pause();
    append(&journal, &[JUMP]);
    assert!(monitor.tick().unwrap().is_empty());
    assert_eq!(monitor.status().scan_status, ScanStatus::Paused);
    assert_eq!(monitor.poll_delay(), Duration::from_millis(50));

    control.resume();
    let events = monitor.tick().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, MonitorEvent::Jumped { system_name, .. } if system_name == "Higher")));
    assert_eq!(monitor.poll_delay(), Duration::from_millis(10));
}

#[test]
fn waits_for_first_journal() {
    let dir = tempfile::tempdir().unwrap();
    let (mut monitor, _state, _store) = monitor(dir.path());
    assert!(monitor.tick().unwrap().is_empty());
    assert_eq!(monitor.status().scan_status, ScanStatus::NoSignal);

    write_journal(dir.path(), "Journal.2026-01-01T000000.01.log", &[LOAD_ALICE], 0);
    let events = monitor.tick().unwrap();
    assert!(matches!(events.last(), Some(MonitorEvent::JournalOpened { .. })));
}

#[test]
fn rotation_switches_to_newer_journal() {
    let dir = tempfile::tempdir().unwrap();
    write_journal(dir.path(), "Journal.2026-01-01T000000.01.log", &[LOAD_ALICE], 60);
    let (mut monitor, _state, _store) = monitor(dir.path());
    monitor.tick().unwrap();
    assert!(monitor.check_rotation().unwrap().is_empty());

    let bob = r#"{"timestamp":"2026-01-02T00:00:00Z","event":"LoadGame","Commander":"Bob"}"#;
    let newer = write_journal(dir.path(), "Journal.2026-01-02T000000.01.log", &[bob], 0);
    let events = monitor.check_rotation().unwrap();
    assert_eq!(
        events,
        vec![
            MonitorEvent::JournalRotated {
                file: "Journal.2026-01-02T000000.01.log".to_string()
            },
            MonitorEvent::CommanderChanged {
                cmdr_name: "Bob".to_string()
            },
        ]
    );

    append(&newer, &[JUMP]);
    let events = monitor.tick().unwrap();
    assert!(events.iter().any(|e| matches!(e, MonitorEvent::Jumped { .. })));
}

#[test]
fn rescan_replays_history_once() {
    let dir = tempfile::tempdir().unwrap();
    let other_scan = SCAN_ELW.replace("Higher 1", "Higher 2");
    write_journal(
        dir.path(),
        "Journal.2026-01-01T000000.01.log",
        &[LOAD_ALICE, JUMP, SCAN_ELW],
        60,
    );
    write_journal(
        dir.path(),
        "Journal.2026-01-02T000000.01.log",
        &[LOAD_ALICE, JUMP, &other_scan],
        0,
    );
    let (mut monitor, _state, _store) = monitor(dir.path());
    monitor.tick().unwrap();

    monitor.control().request_rescan();
    assert_eq!(
        monitor.tick().unwrap(),
        vec![MonitorEvent::RescanComplete {
            files: 2,
            new_candidates: 2,
        }]
    );

    monitor.control().request_rescan();
    assert_eq!(
        monitor.tick().unwrap(),
        vec![MonitorEvent::RescanComplete {
            files: 2,
            new_candidates: 0,
        }]
    );
    assert_eq!(monitor.status().scan_status, ScanStatus::Armed);
}

#[test]
fn shutdown_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    write_journal(dir.path(), "Journal.2026-01-01T000000.01.log", &[LOAD_ALICE], 10);
    let (mut monitor, state, store) = monitor(dir.path());
    monitor.tick().unwrap();
    let session_id = monitor.status().session_id.unwrap();

    monitor.shutdown().unwrap();
    let (_, ended) = store.session_times(&session_id).unwrap().unwrap();
    assert!(ended.is_some());
    assert_eq!(state.context().session_id, None);
    assert!(monitor.control().is_stopped());
    assert!(monitor.tick().unwrap().is_empty());
}
