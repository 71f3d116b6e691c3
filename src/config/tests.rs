//! Tests for config functionality.

use crate::config::Config;
use crate::error::QueueError;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.num_tasks, 15);
    assert_eq!(config.wait_ms, 10_000);
    assert_eq!(config.starvation_ms, 60_000);
    assert_eq!(config.use_bytes, 2);
    assert_eq!(config.separator, 0xAA);
    assert_eq!(config.queue_file, "queue");
    assert_eq!(config.status_file, "done");
    assert_eq!(config.id_file, "id");
    assert_eq!(config.locks_dir, "locks");
    assert_eq!(config.events_file, "events.ndjson");
    assert_eq!(config.progress_file, "progress.bin");
    assert_eq!(config.progress_refresh_ms, 1_000);
    assert_eq!(config.log_level, "info");
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();

    // Should use all defaults
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
num_tasks: 4
wait_ms: 250
"#;
    let config = Config::from_yaml(yaml).unwrap();

    // Specified values should be used
    assert_eq!(config.num_tasks, 4);
    assert_eq!(config.wait(), Duration::from_millis(250));

    // Unspecified values should use defaults
    assert_eq!(config.use_bytes, 2);
    assert_eq!(config.queue_file, "queue");
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
num_tasks: 1
wait_ms: 5
starvation_ms: 50
use_bytes: 4
separator: 126
queue_file: tasks.ndjson
status_file: status.bin
id_file: counter
locks_dir: held
events_file: audit.ndjson
progress_file: snap.bin
progress_refresh_ms: 20
log_level: debug
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.num_tasks, 1);
    assert_eq!(config.starvation_timeout(), Duration::from_millis(50));
    assert_eq!(config.slot_format().unwrap().one_size(), 5);
    assert_eq!(config.slot_format().unwrap().separator(), 0x7E);
    assert_eq!(config.queue_file, "tasks.ndjson");
    assert_eq!(config.status_file, "status.bin");
    assert_eq!(config.id_file, "counter");
    assert_eq!(config.locks_dir, "held");
    assert_eq!(config.events_file, "audit.ndjson");
    assert_eq!(config.progress_file, "snap.bin");
    assert_eq!(config.progress_refresh(), Duration::from_millis(20));
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_unknown_fields_ignored() {
    let config = Config::from_yaml("future_option: true\nnum_tasks: 2\n").unwrap();
    assert_eq!(config.num_tasks, 2);
}

#[test]
fn test_validate_num_tasks_positive() {
    let err = Config::from_yaml("num_tasks: 0").unwrap_err();
    assert!(matches!(err, QueueError::Config(_)));
    assert!(err.to_string().contains("num_tasks"));
}

#[test]
fn test_validate_use_bytes_range() {
    assert!(Config::from_yaml("use_bytes: 0").is_err());
    assert!(Config::from_yaml("use_bytes: 9").is_err());
    assert!(Config::from_yaml("use_bytes: 8").is_ok());
}

#[test]
fn test_validate_separator_not_sentinel() {
    let err = Config::from_yaml("separator: 0").unwrap_err();
    assert!(err.to_string().contains("separator"));
    assert!(Config::from_yaml("separator: 255").is_err());
}

#[test]
fn test_validate_file_names_non_empty() {
    let err = Config::from_yaml("status_file: ''").unwrap_err();
    assert!(err.to_string().contains("status_file"));
}

#[test]
fn test_yaml_round_trip() {
    let mut config = Config::default();
    config.num_tasks = 3;
    config.locks_dir = "beacons".to_string();

    let parsed = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_load_or_default() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("flockwork.yaml");

    assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());

    std::fs::write(&path, "num_tasks: 9\n").unwrap();
    assert_eq!(Config::load_or_default(&path).unwrap().num_tasks, 9);

    std::fs::write(&path, "num_tasks: [not, a, number]\n").unwrap();
    assert!(Config::load(&path).is_err());
}
