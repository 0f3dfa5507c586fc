use survey_core::{ObserverNote, SampleCounts, SliceStatus, SurveyType};
use survey_store::SurveyStore;

fn observe(
    store: &SurveyStore,
    session: &str,
    z_bin: i64,
    status: SliceStatus,
    survey_type: SurveyType,
) -> ObserverNote {
    let mut note = ObserverNote {
        system_name: format!("System at {z_bin}"),
        z_bin,
        session_id: session.to_string(),
        slice_status: status,
        survey_type,
        system_count: Some(12),
        max_distance: Some(19.5),
        ..ObserverNote::new()
    };
    store.save_note(&mut note).unwrap();
    note
}

fn indexes(note: &ObserverNote) -> (Option<i64>, Option<i64>) {
    (note.sample_index, note.system_index)
}

#[test]
fn test_systems_number_within_open_sample() {
    let store = SurveyStore::open_in_memory().unwrap();
    let regular = SurveyType::RegularDensity;

    let a = observe(&store, "S1", 100, SliceStatus::InProgress, regular);
    let b = observe(&store, "S1", 100, SliceStatus::InProgress, regular);
    assert_eq!(indexes(&a), (Some(1), Some(1)));
    assert_eq!(indexes(&b), (Some(1), Some(2)));
    assert_eq!(
        store.sample_counts(100, regular).unwrap(),
        SampleCounts {
            current_sample: 1,
            current_systems: 2,
            total_samples: 0,
        }
    );

    let done = observe(&store, "S1", 100, SliceStatus::Complete, regular);
    assert_eq!(indexes(&done), (Some(1), Some(3)));
    assert_eq!(
        store.sample_counts(100, regular).unwrap(),
        SampleCounts {
            current_sample: 2,
            current_systems: 0,
            total_samples: 1,
        }
    );

    let next = observe(&store, "S1", 100, SliceStatus::InProgress, regular);
    assert_eq!(indexes(&next), (Some(2), Some(1)));
}

#[test]
fn test_progress_carries_across_sessions() {
    let store = SurveyStore::open_in_memory().unwrap();
    let regular = SurveyType::RegularDensity;

    observe(&store, "S1", 150, SliceStatus::InProgress, regular);
    let resumed = observe(&store, "S2", 150, SliceStatus::InProgress, regular);
    assert_eq!(indexes(&resumed), (Some(1), Some(2)));

    observe(&store, "S2", 150, SliceStatus::Complete, regular);
    let fresh = observe(&store, "S3", 150, SliceStatus::InProgress, regular);
    assert_eq!(fresh.sample_index, Some(2));
}

#[test]
fn test_bins_and_survey_types_are_independent() {
    let store = SurveyStore::open_in_memory().unwrap();

    observe(&store, "S1", 0, SliceStatus::Complete, SurveyType::RegularDensity);
    let other_bin = observe(&store, "S1", 50, SliceStatus::InProgress, SurveyType::RegularDensity);
    let other_type = observe(
        &store,
        "S1",
        0,
        SliceStatus::InProgress,
        SurveyType::LogarithmicDensity,
    );
    assert_eq!(indexes(&other_bin), (Some(1), Some(1)));
    assert_eq!(other_type.sample_index, Some(1));

    let counts = store.sample_counts(0, SurveyType::LogarithmicDensity).unwrap();
    assert_eq!(counts.total_samples, 0);
    assert_eq!(counts.current_systems, 1);
}

#[test]
fn test_reset_restarts_numbering() {
    let store = SurveyStore::open_in_memory().unwrap();
    let regular = SurveyType::RegularDensity;

    observe(&store, "S1", 200, SliceStatus::Complete, regular);
    observe(&store, "S1", 200, SliceStatus::InProgress, regular);
    observe(&store, "S1", 250, SliceStatus::InProgress, regular);

    assert_eq!(store.reset_sample_progress(200, regular).unwrap(), 2);
    assert_eq!(
        store.sample_counts(200, regular).unwrap(),
        SampleCounts {
            current_sample: 1,
            current_systems: 0,
            total_samples: 0,
        }
    );
    assert_eq!(store.sample_counts(250, regular).unwrap().current_systems, 1);

    assert_eq!(store.reset_all_progress(None).unwrap(), 1);
    assert!(store.get_all_active().unwrap().is_empty());
}

#[test]
fn test_amended_row_keeps_its_slot() {
    let store = SurveyStore::open_in_memory().unwrap();
    let regular = SurveyType::RegularDensity;

    let first = observe(&store, "S1", 300, SliceStatus::InProgress, regular);
    observe(&store, "S1", 300, SliceStatus::InProgress, regular);

    let mut fix = ObserverNote {
        system_count: Some(14),
        ..first.clone()
    };
    store.amend_note(&first.id, &mut fix).unwrap();
    assert_eq!(indexes(&fix), (Some(1), Some(1)));
    assert_eq!(store.sample_counts(300, regular).unwrap().current_systems, 2);
}
