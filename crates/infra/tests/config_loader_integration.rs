//! Integration tests for the configuration loader
//!
//! Loads full config files through the public API and feeds the result into
//! the components that consume it.

use std::io::Write;

use tempfile::NamedTempFile;
use timekeep_domain::{AttendanceError, LogFormat};
use timekeep_infra::config;
use timekeep_infra::database::DbManager;

fn write_config(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_toml_config_opens_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("from-config.db");
    let path = write_config(
        &format!(
            r#"
            [database]
            path = "{}"
            pool_size = 2

            [engine]
            timezone = "Asia/Kathmandu"

            [devices]
            api_key = "push-secret"
            max_failures = 5

            [scheduler]
            sync_devices = "0 */10 * * * *"

            [logging]
            format = "json"
            "#,
            db_path.display()
        ),
        "toml",
    );

    let config = config::load_from_file(Some(path.clone())).expect("config loads");
    std::fs::remove_file(path).ok();

    assert_eq!(config.devices.api_key.as_deref(), Some("push-secret"));
    assert_eq!(config.devices.max_failures, 5);
    assert_eq!(config.scheduler.sync_devices, "0 */10 * * * *");
    assert_eq!(config.logging.format, LogFormat::Json);

    let manager = DbManager::from_config(&config.database).expect("db opens");
    manager.run_migrations().expect("migrations apply");
    manager.health_check().expect("db healthy");
    assert_eq!(manager.path(), db_path.as_path());
}

#[test]
fn test_invalid_toml_reports_config_error() {
    let path = write_config("[database\npath = ", "toml");

    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(path).ok();

    assert!(matches!(result, Err(AttendanceError::Config(ref m)) if m.contains("TOML")));
}
