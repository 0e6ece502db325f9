//! Unit tests for worker configuration parsing, validation and the persisted
//! runtime snapshot.

use std::io::Write;
use std::time::Duration;

use farm_autopilot::worker::lifecycle::{load_snapshot, millis_to_interval_secs};
use farm_autopilot::{AppError, WorkerConfig};

#[test]
fn empty_file_uses_defaults() {
    let config = WorkerConfig::from_toml_str("").expect("empty config is valid");

    assert_eq!(config.platform, "qq");
    assert!(config.snapshot_path.is_none());
    assert_eq!(config.timing.tick(), Duration::from_millis(300));
    assert_eq!(config.timing.status_interval(), Duration::from_millis(3000));
    assert_eq!(config.timing.status_heartbeat(), Duration::from_millis(8000));
    assert_eq!(config.timing.kickout_grace(), Duration::from_millis(200));
    assert_eq!(config.timing.config_debounce(), Duration::from_millis(200));
    assert_eq!(config.timing.sell_interval(), Duration::from_secs(60));
    assert_eq!(config.timing.sell_initial_delay(), Duration::from_secs(10));
    assert_eq!(config.timing.task_initial_delay(), Duration::from_secs(4));
    assert_eq!(config.timing.task_notify_delay(), Duration::from_millis(1000));
    assert_eq!(config, WorkerConfig::default());
}

#[test]
fn overrides_are_applied() {
    let config = WorkerConfig::from_toml_str(
        r#"
platform = "wx"
snapshot_path = "/var/lib/farm/account-1.json"

[timing]
tick_ms = 100
sell_interval_secs = 120
"#,
    )
    .expect("valid config");

    assert_eq!(config.platform, "wx");
    assert_eq!(
        config.snapshot_path.as_deref(),
        Some(std::path::Path::new("/var/lib/farm/account-1.json"))
    );
    assert_eq!(config.timing.tick_ms, 100);
    assert_eq!(config.timing.sell_interval_secs, 120);
    assert_eq!(config.timing.status_heartbeat_ms, 8000);
}

#[test]
fn zero_tick_is_rejected() {
    let err = WorkerConfig::from_toml_str("[timing]\ntick_ms = 0\n").unwrap_err();
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("timing.tick_ms")));
}

#[test]
fn blank_platform_is_rejected() {
    let err = WorkerConfig::from_toml_str("platform = \"  \"\n").unwrap_err();
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("platform")));
}

#[test]
fn malformed_toml_is_config_error() {
    let err = WorkerConfig::from_toml_str("platform = [").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn load_from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "platform = \"wx\"").unwrap();

    let config = WorkerConfig::load_from_path(file.path()).unwrap();
    assert_eq!(config.platform, "wx");
}

#[test]
fn load_from_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = WorkerConfig::load_from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("failed to read config")));
}

#[test]
fn persisted_snapshot_is_loaded_as_patch() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"automation":{{"sell":false}},"intervals":{{"farm":5}},"preferredSeedId":20002,"__revision":3}}"#
    )
    .unwrap();

    let patch = load_snapshot(file.path()).unwrap();
    assert_eq!(patch.automation.unwrap().get("sell"), Some(&false));
    assert_eq!(patch.intervals.unwrap().farm, Some(5));
    assert_eq!(patch.preferred_seed_id, Some(20_002));
    assert_eq!(patch.revision, Some(3));
}

#[test]
fn invalid_snapshot_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();

    let err = load_snapshot(file.path()).unwrap_err();
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("invalid snapshot")));
}

#[test]
fn start_intervals_round_up_to_seconds() {
    assert_eq!(millis_to_interval_secs(0), 1);
    assert_eq!(millis_to_interval_secs(1), 1);
    assert_eq!(millis_to_interval_secs(2000), 2);
    assert_eq!(millis_to_interval_secs(2001), 3);
    assert_eq!(millis_to_interval_secs(10_000), 10);
}
