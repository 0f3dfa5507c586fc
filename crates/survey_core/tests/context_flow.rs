use survey_core::{
    chain_hash, parse_line, EventKind, JournalStateManager, ObserverNote, SliceStatus,
};

const SESSION: &[&str] = &[
    r#"{"timestamp":"3310-05-01T09:59:00Z","event":"Commander","FID":"F1","Name":"Jameson"}"#,
    r#"{"timestamp":"3310-05-01T10:00:00Z","event":"Location","StarSystem":"Sol","SystemAddress":10477373803,"StarPos":[0.0,0.0,0.0]}"#,
    r#"{"timestamp":"3310-05-01T10:05:00Z","event":"FSDJump","StarSystem":"Plio Eurl AA-A h3","SystemAddress":1,"StarPos":[12.0,96.0,40.0]}"#,
    r#"{"timestamp":"3310-05-01T10:06:00Z","event":"Scan","StarSystem":"Plio Eurl AA-A h3","BodyName":"Plio Eurl AA-A h3 1","BodyID":4,"SystemAddress":1}"#,
    "not json at all",
    r#"{"timestamp":"3310-05-01T10:09:00Z","event":"FSDJump","StarSystem":"Plio Eurl AB-A h4","SystemAddress":2,"StarPos":[13.0,151.0,41.0]}"#,
];

fn replay(state: &JournalStateManager) -> usize {
    let mut skipped = 0;
    for line in SESSION {
        let Some(event) = parse_line(line) else {
            skipped += 1;
            continue;
        };
        match event.kind() {
            EventKind::Commander | EventKind::LoadGame => state.on_commander(&event),
            EventKind::Location => state.on_location(&event),
            EventKind::FsdJump => state.on_fsd_jump(&event),
            EventKind::Scan => state.on_scan(&event),
            _ => {}
        }
    }
    skipped
}

#[test]
fn test_replayed_session_builds_context() {
    let state = JournalStateManager::default();
    assert_eq!(replay(&state), 1);

    let ctx = state.context();
    assert_eq!(ctx.cmdr_name.as_deref(), Some("Jameson"));
    assert_eq!(ctx.system_name.as_deref(), Some("Plio Eurl AB-A h4"));
    assert_eq!(ctx.z_bin, 150);
    assert!(ctx.last_scan_body.is_none());

    // Sol sits in bin 0, so the first jump (0 -> 100) is not a crossing.
    let history = state.z_bin_history();
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].old_z_bin, history[0].new_z_bin), (100, 150));
}

#[test]
fn test_note_from_context_hashes_stably() {
    let state = JournalStateManager::default();
    replay(&state);

    let mut note = ObserverNote::from_context(&state.context(), "0.1.0");
    note.slice_status = SliceStatus::Complete;
    note.system_count = Some(49);
    note.max_distance = Some(18.5);
    note.validate().unwrap();
    assert_eq!(note.corrected_n, Some(50));

    let payload = note.payload().unwrap();
    let first = chain_hash(None, &payload);
    let again = chain_hash(None, &note.payload().unwrap());
    assert_eq!(first, again);

    note.notes = "edited".to_string();
    assert_ne!(chain_hash(None, &note.payload().unwrap()), first);
}
