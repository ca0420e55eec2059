use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

use trade_telemetry::config::{ClassifierStrategy, LogLayout, TelemetryConfig};
use trade_telemetry::error::ConfigError;

#[test]
fn test_defaults() {
    let config = TelemetryConfig::default();

    assert_eq!(config.data_dir, PathBuf::from("telemetry"));
    assert_eq!(config.layout, LogLayout::Unified);
    assert_eq!(config.log_file_name, "session_events.csv");
    assert!(!config.fsync);
    assert_eq!(config.classifier.strategy, ClassifierStrategy::Keyword);
    assert_eq!(config.export.interval(), Some(Duration::from_secs(300)));
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_keeps_other_defaults() {
    let config = TelemetryConfig::from_toml_str(
        r#"
        data_dir = "/tmp/bi"
        layout = "per_category"

        [classifier]
        strategy = "catalog"
        meth = ["glass", "shard"]

        [export]
        interval_secs = 0
        "#,
    )
    .unwrap();

    assert_eq!(config.data_dir, PathBuf::from("/tmp/bi"));
    assert_eq!(config.layout, LogLayout::PerCategory);
    assert_eq!(config.classifier.strategy, ClassifierStrategy::Catalog);
    assert_eq!(
        config.classifier.meth,
        Some(vec!["glass".to_string(), "shard".to_string()])
    );
    assert_eq!(config.classifier.weed, None);
    assert_eq!(config.export.interval(), None);
    assert_eq!(config.cache.capacity, 512);
}

#[test]
fn test_invalid_values_are_rejected() {
    let zero = TelemetryConfig::from_toml_str("[cache]\ncapacity = 0\n");
    assert!(matches!(zero, Err(ConfigError::Invalid(_))));

    let empty_name = TelemetryConfig::from_toml_str("log_file_name = \"  \"\n");
    assert!(matches!(empty_name, Err(ConfigError::Invalid(_))));

    let bad_layout = TelemetryConfig::from_toml_str("layout = \"sideways\"\n");
    assert!(matches!(bad_layout, Err(ConfigError::Parse(_))));
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.toml");
    std::fs::write(&path, "fsync = true\n").unwrap();

    assert!(TelemetryConfig::load(&path).unwrap().fsync);
    assert!(matches!(
        TelemetryConfig::load(&dir.path().join("missing.toml")),
        Err(ConfigError::Read { .. })
    ));
}
