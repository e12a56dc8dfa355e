//! Application configuration: service endpoint, upload limits, table
//! defaults. Loaded from `config.toml` in the platform config directory;
//! a missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::query::{DEFAULT_PAGE_SIZE, PAGE_SIZE_OPTIONS};

const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub upload: UploadConfig,
    pub table: TableConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the spreadsheet processing service.
    pub base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum files accepted in one batch.
    pub max_files: usize,
    /// Accepted file extensions, compared case-insensitively.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: 5,
            allowed_extensions: vec!["xlsx".to_string(), "xls".to_string()],
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    /// Initial page size; must be one of the supported options.
    pub page_size: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Manages config directory and config file operations.
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Load the config file, falling back to defaults when absent. An
    /// unsupported page size is replaced with the default rather than
    /// rejected.
    pub fn load(&self) -> Result<Config> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(&path)?;
        let mut config: Config = toml::from_str(&text)
            .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;
        if !PAGE_SIZE_OPTIONS.contains(&config.table.page_size) {
            warn!(
                page_size = config.table.page_size,
                "unsupported page size in config, using default"
            );
            config.table.page_size = DEFAULT_PAGE_SIZE;
        }
        Ok(config)
    }

    /// Write the given config, creating the directory if needed.
    pub fn save(&self, config: &Config) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)?;
        }
        let text = toml::to_string_pretty(config)?;
        fs::write(self.config_path(), text)?;
        Ok(())
    }
}
