//! services/app/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use mintar_core::DEFAULT_COLLECTION_KEY;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// Directory backing the on-device secure storage.
    pub storage_dir: PathBuf,
    /// Storage key holding the saved collection.
    pub collection_key: String,
    /// Base URL of the remote summarization/auth API.
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: Level::INFO,
            storage_dir: PathBuf::from("./.mintar"),
            collection_key: DEFAULT_COLLECTION_KEY.to_string(),
            api_base_url: "https://backend-mintar.vercel.app/api/v1".to_string(),
            request_timeout: Duration::from_secs(120),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // --- Server Settings ---
        let bind_address = match lookup("BIND_ADDRESS") {
            Some(value) => value.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            None => defaults.bind_address,
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage Settings ---
        let storage_dir = lookup("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);

        let collection_key = lookup("COLLECTION_KEY").unwrap_or(defaults.collection_key);
        if collection_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "COLLECTION_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        // --- Remote API Settings ---
        let api_base_url = lookup("MINTAR_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_number::<u64>("REQUEST_TIMEOUT_SECS", &value)?),
            None => defaults.request_timeout,
        };

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(value) => parse_number::<usize>("MAX_UPLOAD_BYTES", &value)?,
            None => defaults.max_upload_bytes,
        };

        Ok(Self {
            bind_address,
            log_level,
            storage_dir,
            collection_key,
            api_base_url,
            request_timeout,
            max_upload_bytes,
        })
    }
}

fn parse_number<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
