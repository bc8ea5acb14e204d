//! # Runtime Configuration
//!
//! Process configuration: an optional TOML file, then `TLS_*` environment
//! overrides on top.
//!
//! ```toml
//! data_file = "/var/lib/tl/directory.json"
//! sweep_interval_secs = 30
//! log_level = "info"
//!
//! [directory]
//! allow_insecure_transport = false
//! high_water = 0.85
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tl_directory::{DirectoryConfig, DirectoryError};

/// Allow backends on plain transport (`true`/`false`).
pub const ENV_ALLOW_INSECURE: &str = "TLS_ALLOW_INSECURE_TMS";
/// Path of the JSON directory file.
pub const ENV_DATA_FILE: &str = "TLS_DATA_FILE";
/// Log filter, e.g. `info` or `tl_directory=debug`.
pub const ENV_LOG_LEVEL: &str = "TLS_LOG_LEVEL";
/// Seconds between maintenance passes.
pub const ENV_SWEEP_INTERVAL: &str = "TLS_SWEEP_INTERVAL_SECS";
/// Upper bound on active backends.
pub const ENV_MAX_BACKENDS: &str = "TLS_MAX_BACKENDS";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Cannot read config file {path}: {source}")]
    Io {
        /// File that was requested
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`RuntimeConfig`].
    #[error("Cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment override has an unusable value.
    #[error("Invalid value {value:?} for {name}")]
    InvalidEnv {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },

    /// Values parse but do not make sense together.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<DirectoryError> for ConfigError {
    fn from(e: DirectoryError) -> Self {
        Self::Invalid(e.to_string())
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// JSON directory file. In-memory only when unset.
    pub data_file: Option<PathBuf>,
    /// Seconds between maintenance passes. Defaults to the heartbeat interval.
    pub sweep_interval_secs: Option<u64>,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Directory core tunables.
    pub directory: DirectoryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            sweep_interval_secs: None,
            log_level: "info".to_string(),
            directory: DirectoryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// File (if any), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TLS_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_ALLOW_INSECURE) {
            self.directory.allow_insecure_transport = parse_bool(ENV_ALLOW_INSECURE, &value)?;
        }
        if let Some(value) = lookup(ENV_DATA_FILE) {
            self.data_file = (!value.trim().is_empty()).then(|| PathBuf::from(value.trim()));
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        if let Some(value) = lookup(ENV_SWEEP_INTERVAL) {
            self.sweep_interval_secs = Some(parse_number(ENV_SWEEP_INTERVAL, &value)?);
        }
        if let Some(value) = lookup(ENV_MAX_BACKENDS) {
            self.directory.max_backends = Some(parse_number(ENV_MAX_BACKENDS, &value)?);
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.directory.validate()?;
        if self.sweep_interval_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Time between maintenance passes.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(
            self.sweep_interval_secs
                .unwrap_or(self.directory.heartbeat_interval_secs),
        )
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: value.to_string(),
    })
}
