//! Bootstrap configuration loading and data folder resolution
//!
//! Bootstrap values resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never stops startup. It is logged and
//! compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "SOUN_DATA_FOLDER";

/// Environment variable holding the Postgres connection string
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Bootstrap configuration file contents
///
/// Every section is optional; absent values fall through to compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding uploads and other local state
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Postgres connection string
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub uploads: UploadsConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Chat-completions provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_llm_model(),
            base_url: default_llm_base_url(),
        }
    }
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_upload_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_upload_max_bytes(),
        }
    }
}

/// Database pool tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Attempts made by the transient-error retry wrapper
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_upload_max_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_max_connections() -> u32 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub config_file: PathBuf,
    pub port: u16,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            data_folder: default_data_folder(),
            config_file: default_config_file(),
            port: 5780,
            log_level: default_log_level(),
        }
    }
}

/// Default data folder: `<data_local_dir>/soun`
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("soun"))
        .unwrap_or_else(|| PathBuf::from("./soun_data"))
}

/// Default config file: `<config_dir>/soun/config.toml`
fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("soun").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("soun.toml"))
}

/// Load TOML config with graceful degradation
///
/// Missing file → defaults (info). Unparseable file → defaults (warn).
pub fn load_toml_config(path: &Path) -> TomlConfig {
    if !path.exists() {
        info!("Config file not found at {}, using defaults", path.display());
        return TomlConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str::<TomlConfig>(&content) {
            Ok(config) => {
                info!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                TomlConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Data folder resolution (CLI → ENV → TOML → compiled default)
#[derive(Debug, Default)]
pub struct DataFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl DataFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.data_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().data_folder
    }
}

/// Creates the data folder layout on first run
#[derive(Debug, Clone)]
pub struct DataFolderInitializer {
    data_folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    pub fn ensure_directories_exist(&self) -> Result<()> {
        if !self.data_folder.exists() {
            info!("Creating data folder: {}", self.data_folder.display());
        }
        std::fs::create_dir_all(self.uploads_path())?;
        Ok(())
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.data_folder.join("uploads")
    }
}

/// Resolve the Postgres URL (CLI → ENV → TOML); there is no compiled default
pub fn resolve_database_url(cli_arg: Option<&str>, config: &TomlConfig) -> Result<String> {
    if let Some(url) = cli_arg.filter(|u| !u.trim().is_empty()) {
        return Ok(url.to_string());
    }

    if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
        if !url.trim().is_empty() {
            return Ok(url);
        }
    }

    if let Some(url) = config.database_url.as_ref().filter(|u| !u.trim().is_empty()) {
        return Ok(url.clone());
    }

    Err(Error::Config(
        "Database URL not configured. Use --database-url, DATABASE_URL, \
         or database_url in the config file"
            .to_string(),
    ))
}
