//! Tests for configuration loading and layering

use camsource::config::CamSourceConfig;
use camsource::WebcamDriver;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = CamSourceConfig::default();
    assert_eq!(config.discovery.preferred_driver, WebcamDriver::Native);
    assert_eq!(config.probing.workers, 3);
    assert_eq!(config.probing.resolution_timeout(), Duration::from_secs(5));
    assert_eq!(config.dialog.visible_name_chars, 22);
    assert!(config.validate().is_ok());
}

#[test]
fn test_save_and_load_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("camsource.toml");

    let mut config = CamSourceConfig::default();
    config.discovery.preferred_driver = WebcamDriver::IndexProbe;
    config.dialog.source_name_prefix = "Bench".to_string();
    config.save_to_file(&path).unwrap();

    let loaded = CamSourceConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("camsource.toml");
    std::fs::write(&path, "[probing]\nworkers = 2\n").unwrap();

    let loaded = CamSourceConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.probing.workers, 2);
    assert_eq!(loaded.probing.test_timeout_ms, 10000);
    assert_eq!(loaded.discovery, CamSourceConfig::default().discovery);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("camsource.toml");
    std::fs::write(&path, "[probing\nworkers = ").unwrap();

    assert!(CamSourceConfig::load_from_file(&path).is_err());
}

#[test]
fn test_layered_file_and_environment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("camsource.toml");
    std::fs::write(
        &path,
        "[discovery]\npreferred_driver = \"index_probe\"\n\n[probing]\nworkers = 2\n",
    )
    .unwrap();

    std::env::set_var("CAMSOURCE__PROBING__WORKERS", "5");
    let loaded = CamSourceConfig::load_layered(&path);
    std::env::remove_var("CAMSOURCE__PROBING__WORKERS");

    let loaded = loaded.unwrap();
    assert_eq!(loaded.discovery.preferred_driver, WebcamDriver::IndexProbe);
    assert_eq!(loaded.probing.workers, 5);
    assert_eq!(loaded.probing.resolution_timeout_ms, 5000);

    let missing = CamSourceConfig::load_layered(dir.path().join("absent.toml")).unwrap();
    assert_eq!(missing.discovery.preferred_driver, WebcamDriver::Native);
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut config = CamSourceConfig::default();
    config.probing.workers = 0;
    assert!(config.validate().is_err());

    let mut config = CamSourceConfig::default();
    config.discovery.max_probe_index = 0;
    assert!(config.validate().is_err());

    let mut config = CamSourceConfig::default();
    config.probing.resolution_timeout_ms = 0;
    assert!(config.validate().is_err());
}
