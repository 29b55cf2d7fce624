//! Configuration resolution and graceful degradation
//!
//! Uses serial_test: tests touching SOUN_DATA_FOLDER or DATABASE_URL run
//! sequentially so environment changes cannot race.

use serial_test::serial;
use soun_common::config::{
    load_toml_config, resolve_database_url, write_toml_config, DataFolderInitializer,
    DataFolderResolver, TomlConfig, DATABASE_URL_ENV, DATA_FOLDER_ENV,
};
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_arg_beats_env_and_toml() {
    env::set_var(DATA_FOLDER_ENV, "/tmp/from-env");
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let resolved = DataFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/from-cli")))
        .with_toml(&toml)
        .resolve();

    env::remove_var(DATA_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(DATA_FOLDER_ENV, "/tmp/from-env");
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let resolved = DataFolderResolver::new().with_toml(&toml).resolve();

    env::remove_var(DATA_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/from-env"));
}

#[test]
#[serial]
fn test_toml_used_when_no_cli_or_env() {
    env::remove_var(DATA_FOLDER_ENV);
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let resolved = DataFolderResolver::new().with_toml(&toml).resolve();
    assert_eq!(resolved, PathBuf::from("/tmp/from-toml"));
}

#[test]
#[serial]
fn test_empty_env_falls_through_to_default() {
    env::set_var(DATA_FOLDER_ENV, "   ");
    let resolved = DataFolderResolver::new().resolve();
    env::remove_var(DATA_FOLDER_ENV);

    assert!(!resolved.as_os_str().is_empty());
    assert_ne!(resolved, PathBuf::from("   "));
}

#[test]
fn test_missing_toml_file_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml"));

    assert!(config.data_folder.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_malformed_toml_file_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "this is [not valid toml").unwrap();

    let config = load_toml_config(&path);
    assert!(config.database_url.is_none());
    assert_eq!(config.database.max_connections, 10);
}

#[test]
fn test_write_then_load_preserves_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let mut config = TomlConfig::default();
    config.llm.api_key = Some("sk-written".to_string());
    config.uploads.max_bytes = 1024;
    write_toml_config(&config, &path).unwrap();

    let loaded = load_toml_config(&path);
    assert_eq!(loaded.llm.api_key.as_deref(), Some("sk-written"));
    assert_eq!(loaded.uploads.max_bytes, 1024);
    assert!(!path.with_extension("toml.tmp").exists());
}

#[test]
fn test_initializer_creates_uploads_folder() {
    let temp_dir = TempDir::new().unwrap();
    let data_folder = temp_dir.path().join("soun");

    let initializer = DataFolderInitializer::new(data_folder.clone());
    initializer.ensure_directories_exist().unwrap();

    assert!(data_folder.join("uploads").is_dir());
    assert_eq!(initializer.data_folder(), data_folder.as_path());
}

#[test]
#[serial]
fn test_database_url_priority() {
    env::set_var(DATABASE_URL_ENV, "postgres://env/db");
    let toml = TomlConfig {
        database_url: Some("postgres://toml/db".to_string()),
        ..Default::default()
    };

    assert_eq!(
        resolve_database_url(Some("postgres://cli/db"), &toml).unwrap(),
        "postgres://cli/db"
    );
    assert_eq!(resolve_database_url(None, &toml).unwrap(), "postgres://env/db");

    env::remove_var(DATABASE_URL_ENV);
    assert_eq!(resolve_database_url(None, &toml).unwrap(), "postgres://toml/db");
}

#[test]
#[serial]
fn test_database_url_missing_is_config_error() {
    env::remove_var(DATABASE_URL_ENV);
    let result = resolve_database_url(None, &TomlConfig::default());
    assert!(matches!(result, Err(soun_common::Error::Config(_))));
}
