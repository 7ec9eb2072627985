//! Server configuration module.
//!
//! Parses configuration from environment variables for the wiki server.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PORT` | No | 8080 | HTTP server port |
//!
//! The history tracker settings (`WIKI_DATA_DIR`, `WIKI_HISTORY_DB`, ...)
//! are read by [`wiki_history::config::Config`].

use std::env;

use thiserror::Error;
use wiki_history::config::{Config as HistoryConfig, ConfigError as HistoryConfigError};

/// Default HTTP server port.
const DEFAULT_PORT: u16 = 8080;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port number is invalid.
    #[error("invalid port number: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),

    /// The history tracker configuration is invalid.
    #[error("history configuration: {0}")]
    History(#[from] HistoryConfigError),
}

/// Server configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,

    /// Settings of the embedded history recorder.
    pub history: HistoryConfig,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `PORT` is not a valid u16 or the history
    /// settings are invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(val) => val.trim().parse::<u16>()?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            history: HistoryConfig::from_env()?,
        })
    }
}
