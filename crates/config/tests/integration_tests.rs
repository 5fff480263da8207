//! Integration tests for the configuration system

use fairway_config::{
    AppConfig, Config, ConfigManager, ConfigSection, LogLevel, SyncSettings, CONFIG_VERSION,
};
use std::fs;
use tempfile::TempDir;

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())?;
    Ok((temp_dir, manager))
}

#[test]
fn test_full_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    assert!(manager.initialize()?);

    let config = manager.load()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let mut modified = config.clone();
    modified.sync.max_retries = 12;
    modified.app.log_level = LogLevel::Warn;
    manager.save(&modified)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded.sync.max_retries, 12);
    assert_eq!(reloaded.app.log_level, LogLevel::Warn);

    manager.reset()?;
    assert_eq!(manager.load()?, Config::default());

    Ok(())
}

#[test]
fn test_config_validation_integration() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    manager.save(&Config::default())?;
    assert!(manager.validate()?.is_empty());

    let mut invalid = Config::default();
    invalid.sync.remote_url = "not a url".to_string();
    assert!(manager.save(&invalid).is_err());

    Ok(())
}

#[test]
fn test_hand_edited_invalid_file_loads_with_warnings() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    fs::write(
        manager.config_path(),
        "[sync]\nmax_retries = 0\nremote_url = \"https://api.fairway.golf/v1\"\n",
    )?;

    let config = manager.load()?;
    assert_eq!(config.sync.max_retries, 0);

    let errors = manager.validate()?;
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("sync.max_retries"));

    Ok(())
}

#[test]
fn test_written_file_is_readable_toml() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    let contents = fs::read_to_string(manager.config_path())?;
    assert!(contents.contains("[app]"));
    assert!(contents.contains("[sync]"));
    assert!(contents.contains("remote_url"));
    assert!(!contents.contains("auth_token"));

    Ok(())
}

#[test]
fn test_section_names() {
    assert_eq!(AppConfig::default().section_name(), "app");
    assert_eq!(SyncSettings::default().section_name(), "sync");
}
