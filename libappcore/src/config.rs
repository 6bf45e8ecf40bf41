//! Configuration management for Appcore

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::endpoint::{Platform, ANDROID_DEFAULT_HOST, DEFAULT_HOST};
use crate::error::{ConfigError, Result};
use crate::query::QueryDefaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host used when `APPCORE_API_HOST` is not set
    #[serde(default)]
    pub host: Option<String>,
    /// Platform override; detected from the build target when absent
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default = "default_android_host")]
    pub android_host: String,
    #[serde(default = "default_host")]
    pub default_host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: None,
            platform: None,
            android_host: default_android_host(),
            default_host: default_host(),
        }
    }
}

fn default_android_host() -> String {
    ANDROID_DEFAULT_HOST.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Directory holding persisted values; defaults to the XDG data dir
    #[serde(default)]
    pub storage_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Seconds before a cached result goes stale; absent means never
    #[serde(default)]
    pub stale_time_secs: Option<u64>,
    #[serde(default)]
    pub retry: u32,
    #[serde(default)]
    pub mutation_retry: u32,
    #[serde(default)]
    pub dedupe_in_flight: bool,
    #[serde(default)]
    pub refetch_on_window_focus: bool,
}

impl QueryConfig {
    pub fn to_defaults(&self) -> QueryDefaults {
        QueryDefaults {
            stale_time: self.stale_time_secs.map(Duration::from_secs),
            retry: self.retry,
            mutation_retry: self.mutation_retry,
            dedupe_in_flight: self.dedupe_in_flight,
            refetch_on_window_focus: self.refetch_on_window_focus,
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default_config());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Directory used for durable key/value storage
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.locale.storage_dir {
            Some(dir) => Ok(PathBuf::from(shellexpand::tilde(dir).to_string())),
            None => resolve_data_path(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("APPCORE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("appcore").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("appcore"))
}
