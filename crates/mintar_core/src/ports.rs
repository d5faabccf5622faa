//! crates/mintar_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the device storage primitive and the remote API.

use async_trait::async_trait;
use crate::domain::{DocumentUpload, LoginData, ProfileUpdate, StudySummary};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., storage, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Storage I/O error: {0}")]
    Io(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Too many requests: {0}")]
    RateLimited(String),
    #[error("The uploaded file is not recognised as study material")]
    UnsupportedDocument,
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A scoped, persistent key-value primitive (the device's secure storage).
///
/// Every call is atomic on its own; there is no compare-and-swap.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    /// Removes the key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> PortResult<()>;
}

#[async_trait]
pub trait SummarizationService: Send + Sync {
    /// Uploads a document and returns the generated study material.
    /// Anonymous uploads (no token) are subject to the API's trial quota.
    async fn summarize(
        &self,
        upload: DocumentUpload,
        token: Option<&str>,
    ) -> PortResult<StudySummary>;
}

#[async_trait]
pub trait AuthenticationService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> PortResult<LoginData>;

    /// Registers an account. Returns `None` when the API creates the account
    /// without logging the user in.
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> PortResult<Option<LoginData>>;

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> PortResult<()>;
}
