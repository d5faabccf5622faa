//! services/app/src/error.rs
//!
//! Defines the primary error type for the companion service.

use crate::config::ConfigError;
use mintar_core::{PortError, StoreError};

/// The primary error type for the `app` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a failure of the saved collection store.
    #[error("Collection Store Error: {0}")]
    Store(#[from] StoreError),

    /// Represents an error building the HTTP client for the remote API.
    #[error("HTTP Client Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
