//! Integration tests for configuration loading

use zone_monitor::domain::{Coordinate, ZoneKind};
use zone_monitor::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[tracking]
foreground_interval_ms = 2000
background_interval_ms = 30000
min_displacement_m = 5.0
background_task_id = "test-task"
initial_fix = false

[background_notice]
title = "Tracking"
body = "Zones are being watched"

[notifications]
queue_size = 16

[journal]
enabled = false
file = "/tmp/test-transitions.jsonl"

[metrics]
interval_secs = 15

[replay]
pace_ms = 50

[[zones]]
id = "outlet"
latitude = 51.5
longitude = -0.12
radius_m = 200.0
kind = "saving_opportunity"
notify_on_entry = false

[[zones]]
id = "boutique"
name = "Boutique Row"
latitude = 51.51
longitude = -0.13
radius_m = 60.0
kind = "high_expense"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.foreground_interval_ms(), 2000);
    assert_eq!(config.background_interval_ms(), 30_000);
    assert_eq!(config.min_displacement_m(), 5.0);
    assert_eq!(config.background_task_id(), "test-task");
    assert!(!config.initial_fix());
    assert_eq!(config.notice_title(), "Tracking");
    assert_eq!(config.notice_body(), "Zones are being watched");
    assert_eq!(config.notification_queue_size(), 16);
    assert!(!config.journal_enabled());
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.replay_pace_ms(), 50);

    let zones = config.zones();
    assert_eq!(zones.len(), 2);
    assert_eq!(zones[0].id, "outlet");
    assert_eq!(zones[0].kind, ZoneKind::SavingOpportunity);
    assert_eq!(zones[0].center, Coordinate::new(51.5, -0.12));
    assert!(!zones[0].notify_on_entry);
    assert!(zones[0].notify_on_exit);
    assert_eq!(zones[1].display_name(), "Boutique Row");
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[tracking\nforeground_interval_ms = 1").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());

    let config = Config::load_from_path(temp_file.path().to_str().unwrap());
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_unknown_zone_kind_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let config_content = r#"
[[zones]]
id = "z"
latitude = 0.0
longitude = 0.0
radius_m = 10.0
kind = "casino"
"#;
    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.foreground_interval_ms(), 5000);
    assert_eq!(config.background_interval_ms(), 60_000);
    assert_eq!(config.notification_queue_size(), 64);
    assert!(config.zones().is_empty());
}
