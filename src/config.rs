//! Configuration module for the feed relay.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - A TOML or JSON configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `FEEDWATCH_` and use double
//! underscores to separate nested levels:
//! - `FEEDWATCH_WATCH__WORKERS=4` sets `watch.workers`
//! - `FEEDWATCH_WATCH__POLL_INTERVAL_MS=250` sets `watch.poll_interval_ms`
//! - `FEEDWATCH_SUBMIT__ENDPOINT=http://collector:4000/data` sets `submit.endpoint`

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::document::DocumentFormat;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "FEEDWATCH_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("Failed to write configuration to {path}: {reason}")]
    Save { path: PathBuf, reason: String },
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// Directories scanned on every poll, in this order.
    #[serde(default)]
    pub feeds: Vec<PathBuf>,

    /// Change detection and worker pool settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Document parser settings
    #[serde(default)]
    pub parser: ParserConfig,

    /// Remote collector settings
    #[serde(default)]
    pub submit: SubmitConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Delay between directory scans in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of concurrent processors
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Event queue capacity. 0 hands each event directly to a waiting
    /// processor; a full queue always blocks the scan, events are never dropped.
    #[serde(default)]
    pub queue_capacity: usize,

    /// Only files with these extensions are picked up (empty = all files)
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ParserConfig {
    #[serde(default)]
    pub format: DocumentFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SubmitConfig {
    /// Collector URL receiving one JSON document per POST
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Re-offer files the collector answered `false` for
    #[serde(default)]
    pub retry_rejected: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all targets
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `feedwatch::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_workers() -> usize {
    8
}
fn default_endpoint() -> String {
    "http://127.0.0.1:4000/data".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            workers: default_workers(),
            queue_capacity: 0,
            extensions: Vec::new(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            retry_rejected: false,
        }
    }
}

impl SubmitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from a specific file, layered over the defaults and
    /// under `FEEDWATCH_` environment variables.
    ///
    /// Files ending in `.toml` are read as TOML, anything else as JSON.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        let figment = if is_toml(path) {
            figment.merge(Toml::file(path))
        } else {
            figment.merge(Json::file(path))
        };

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Extract(Box::new(e)))
    }

    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(invalid("at least one feed directory is required"));
        }
        if self.watch.workers == 0 {
            return Err(invalid("watch.workers must be greater than zero"));
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(invalid("watch.poll_interval_ms must be greater than zero"));
        }
        if self.submit.endpoint.trim().is_empty() {
            return Err(invalid("submit.endpoint must not be empty"));
        }
        Ok(())
    }

    /// Save current configuration to file as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let save_err = |reason: String| ConfigError::Save {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| save_err(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| save_err(e.to_string()))?;
        std::fs::write(path, toml_string).map_err(|e| save_err(e.to_string()))
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_string(),
    }
}
