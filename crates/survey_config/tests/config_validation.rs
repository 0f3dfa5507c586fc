use std::path::PathBuf;

use survey_config::{find_config_file, load_config, save_config, validate_config, AppConfig};

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(Some(&dir.path().join("absent.yaml"))).unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(load_config(None).unwrap(), AppConfig::default());
}

#[test]
fn test_partial_yaml_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(
        &path,
        "application:\n  test_mode: true\nrating:\n  temp_a_min: 250.0\nmonitoring:\n  poll_fast_seconds: 0.5\n",
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert!(config.application.test_mode);
    assert_eq!(config.application.name, "DW3 Survey Logger");
    assert!((config.rating.temp_a_min - 250.0).abs() < f64::EPSILON);
    assert!((config.rating.temp_a_max - 320.0).abs() < f64::EPSILON);
    assert!((config.monitoring.poll_fast_seconds - 0.5).abs() < f64::EPSILON);
    assert_eq!(config.monitoring.z_bin_size, 50);
}

#[test]
fn test_json_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"paths": {"data_dir": "/tmp/survey-data"}}"#).unwrap();
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.db_path(), PathBuf::from("/tmp/survey-data/survey.db"));
}

#[test]
fn test_malformed_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = load_config(Some(&path)).unwrap_err();
    assert!(format!("{err:#}").contains("config.json"));
}

#[test]
fn test_every_violation_is_reported() {
    let mut config = AppConfig::default();
    config.rating.temp_a_min = 400.0;
    config.rating.grav_b_max = 0.1;
    config.rating.worth_dist_max = 0.0;
    config.monitoring.poll_slow_seconds = -1.0;
    config.monitoring.z_bin_size = 0;

    let errors = validate_config(&config);
    assert_eq!(
        errors,
        [
            "temp_a_min must be less than temp_a_max",
            "grav_b_min must be less than grav_b_max",
            "worth_dist_max must be positive",
            "poll_slow_seconds must be positive",
            "z_bin_size must be positive",
        ]
    );
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.paths.journal_dir = Some(PathBuf::from("/journals"));
    config.ui.comms_max_lines = 75;

    for name in ["out.yaml", "out.json"] {
        let path = dir.path().join(name);
        save_config(&config, &path).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }
}

#[test]
fn test_find_config_prefers_first_directory() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    std::fs::write(second.path().join("config.json"), "{}").unwrap();
    let dirs = [first.path().to_path_buf(), second.path().to_path_buf()];
    assert_eq!(
        find_config_file(&dirs),
        Some(second.path().join("config.json"))
    );

    std::fs::write(first.path().join("config.yml"), "").unwrap();
    assert_eq!(find_config_file(&dirs), Some(first.path().join("config.yml")));
}
