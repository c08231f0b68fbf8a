use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pushgate_pushkin::{DummyConfig, GcmConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PUSHGATE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "pushgate.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config file not found at {0}")]
    NotFound(PathBuf),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub apps: BTreeMap<String, AppConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write logs to this file instead of stdout.
    #[serde(default)]
    pub logfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_dbfile")]
    pub dbfile: String,
}

/// Prometheus scrape listener. Disabled unless `port` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Provider settings for one app ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AppConfig {
    Gcm(GcmConfig),
    Dummy(DummyConfig),
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_metrics_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_dbfile() -> String {
    "pushgate.db".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            logfile: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            bind_address: default_metrics_bind_address(),
            port: None,
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dbfile: default_dbfile(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .log
            .logfile
            .as_ref()
            .is_some_and(|path| path.file_name().is_none())
        {
            return Err(ConfigError::Invalid("log.logfile must name a file".into()));
        }

        if self.apps.is_empty() {
            return Err(ConfigError::Invalid("no apps configured".into()));
        }

        for (app_id, app) in &self.apps {
            let AppConfig::Gcm(gcm) = app else {
                continue;
            };

            if gcm.api_key.is_empty() {
                return Err(ConfigError::Invalid(format!("{app_id}: no API key set")));
            }
            if gcm.max_connections == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{app_id}: max_connections must be at least 1"
                )));
            }
            if gcm.max_tries == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{app_id}: max_tries must be at least 1"
                )));
            }
        }

        Ok(())
    }
}
