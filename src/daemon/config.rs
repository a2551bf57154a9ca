//! Configuration management for daemon mode
//!
//! Handles TOML configuration parsing, validation and command-line overrides

use crate::constants::{
    APP_NAME, CONFIG_FILE_NAME, DEFAULT_SOCKET_PATH, POLLING_INTERVAL_DEFAULT,
    POLLING_INTERVAL_MAX, POLLING_INTERVAL_MIN,
};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main daemon configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfiguration {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub source: SourceSettings,
}

/// Core daemon runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Unix socket the control channel is exposed on
    pub socket_path: PathBuf,
    /// Default log filter when RUST_LOG is not set
    pub log_level: String,
}

/// Process notification source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Process table polling interval in seconds (0.1-300.0)
    pub polling_interval: f64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            log_level: "info".to_string(),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            polling_interval: POLLING_INTERVAL_DEFAULT,
        }
    }
}

impl DaemonConfiguration {
    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DaemonConfiguration =
            toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Load `path` if given, else the default location if a file exists there,
    /// else built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        match Self::default_config_path() {
            Ok(default_path) if default_path.exists() => Self::load_from_file(&default_path),
            _ => Ok(Self::default()),
        }
    }

    /// Default configuration file location
    pub fn default_config_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Could not determine configuration directory")?;
        Ok(base.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.source.polling_interval;
        if !(POLLING_INTERVAL_MIN..=POLLING_INTERVAL_MAX).contains(&interval) {
            return Err(ConfigError::InvalidInterval(interval));
        }
        if self.daemon.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptySocketPath);
        }
        Ok(())
    }

    pub fn polling_duration(&self) -> Duration {
        Duration::from_secs_f64(self.source.polling_interval)
    }

    /// Apply command-line overrides and re-validate
    pub fn with_overrides(
        mut self,
        socket_path: Option<PathBuf>,
        polling_interval: Option<f64>,
    ) -> Result<Self, ConfigError> {
        if let Some(socket_path) = socket_path {
            self.daemon.socket_path = socket_path;
        }
        if let Some(interval) = polling_interval {
            self.source.polling_interval = interval;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
