//! Configuration module for the wiki history tracker.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `WIKI_DATA_DIR` | No | `./data` | Root directory of the Markdown pages |
//! | `WIKI_HISTORY_DB` | No | `<data dir>/wiki/history.db` | SQLite history database |
//! | `WIKI_HISTORY_SCAN_INTERVAL_SECS` | No | 300 | Seconds between periodic passes (>= 1) |
//! | `WIKI_HISTORY_SETTLE_MS` | No | 500 | Delay before an on-demand pass |
//! | `WIKI_HISTORY_WATCH` | No | true | Request a pass on filesystem changes |
//!
//! # Example
//!
//! ```no_run
//! use wiki_history::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Tracking: {}", config.data_dir.display());
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;

use crate::trigger::RecorderSettings;

/// Default tracked root, relative to the working directory.
const DEFAULT_DATA_DIR: &str = "data";

/// Application directory under the platform data directory.
const DEFAULT_APP_DIR: &str = "wiki";

/// Database file name inside the application directory.
const DEFAULT_DB_FILE: &str = "history.db";

/// Default period of the background scan (in seconds).
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 300;

/// Default settle delay after an on-demand request (in milliseconds).
const DEFAULT_SETTLE_MS: u64 = 500;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine the platform data directory.
    #[error("failed to determine platform data directory")]
    NoDataDirectory,
}

/// Configuration for the history tracker.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory whose `.md` files are tracked.
    pub data_dir: PathBuf,

    /// Location of the SQLite history database.
    pub db_path: PathBuf,

    /// Period of the background pass.
    pub scan_interval: Duration,

    /// Quiet period between an on-demand request and its pass.
    pub settle_delay: Duration,

    /// Whether filesystem events request passes.
    pub watch_enabled: bool,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - A numeric variable is not an integer, or the scan interval is 0
    /// - `WIKI_HISTORY_WATCH` is not a recognizable boolean
    /// - `WIKI_HISTORY_DB` is unset and the platform data directory is unknown
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = env::var("WIKI_DATA_DIR")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);

        let db_path = match env::var("WIKI_HISTORY_DB") {
            Ok(val) if !val.trim().is_empty() => PathBuf::from(val),
            _ => default_db_path()?,
        };

        let scan_interval_secs =
            parse_u64("WIKI_HISTORY_SCAN_INTERVAL_SECS", DEFAULT_SCAN_INTERVAL_SECS)?;
        if scan_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WIKI_HISTORY_SCAN_INTERVAL_SECS".to_string(),
                message: "scan interval must be at least 1 second".to_string(),
            });
        }

        let settle_ms = parse_u64("WIKI_HISTORY_SETTLE_MS", DEFAULT_SETTLE_MS)?;

        let watch_enabled = match env::var("WIKI_HISTORY_WATCH") {
            Ok(val) => parse_bool(&val).ok_or_else(|| ConfigError::InvalidValue {
                key: "WIKI_HISTORY_WATCH".to_string(),
                message: format!("expected true or false, got '{val}'"),
            })?,
            Err(_) => true,
        };

        Ok(Self {
            data_dir,
            db_path,
            scan_interval: Duration::from_secs(scan_interval_secs),
            settle_delay: Duration::from_millis(settle_ms),
            watch_enabled,
        })
    }

    /// Timing for the background recorder.
    #[must_use]
    pub fn recorder_settings(&self) -> RecorderSettings {
        RecorderSettings {
            scan_interval: self.scan_interval,
            settle_delay: self.settle_delay,
        }
    }
}

fn default_db_path() -> Result<PathBuf, ConfigError> {
    let base_dirs = BaseDirs::new().ok_or(ConfigError::NoDataDirectory)?;
    Ok(base_dirs
        .data_dir()
        .join(DEFAULT_APP_DIR)
        .join(DEFAULT_DB_FILE))
}

fn parse_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(val) => val.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected non-negative integer, got '{val}'"),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
