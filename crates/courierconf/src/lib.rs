//! Configuration loading for courier.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/courier/config.toml` (system)
//! 2. `~/.config/courier/config.toml` (user)
//! 3. `./courier.toml`, or a path given on the command line
//! 4. Environment variables (`COURIER_*`)
//!
//! # Example Config
//!
//! ```toml
//! [server]
//! url = "http://broker:7070"
//! timeout_ms = 5000
//!
//! [polling]
//! period_ms = 30
//! topics = ["orders", "payments"]
//!
//! [telemetry]
//! log_level = "info,courier=debug"
//! ```

pub mod loader;

pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where the topic service lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the service.
    /// Default: http://localhost:7070
    pub url: String,

    /// Per-request timeout.
    /// Default: 30000
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7070".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Pause between sweeps.
    /// Default: 30
    pub period_ms: u64,

    /// Topics to listen on when none are given explicitly.
    pub topics: Vec<String>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            period_ms: 30,
            topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive.
    /// Default: info,courier=debug
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info,courier=debug".to_string(),
        }
    }
}

/// Complete courier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CourierConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub telemetry: TelemetryConfig,
}

impl CourierConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./courier.toml`.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and env vars contributed.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = CourierConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Reject values the connector cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.server.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "server.url must be an http(s) URL, got '{}'",
                url
            )));
        }
        if self.polling.period_ms == 0 {
            return Err(ConfigError::Invalid("polling.period_ms must be positive".into()));
        }
        if self.server.timeout_ms == 0 {
            return Err(ConfigError::Invalid("server.timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.polling.period_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.timeout_ms)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let body = toml::to_string_pretty(self).unwrap_or_default();
        format!("# courier configuration\n\n{}", body)
    }
}
