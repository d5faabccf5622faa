//! services/app/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use mintar_core::{
    ports::{AuthenticationService, KeyValueBackend, SummarizationService},
    AuthSessionStore, CollectionStore,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CollectionStore>,
    pub sessions: Arc<AuthSessionStore>,
    pub summarizer: Arc<dyn SummarizationService>,
    pub auth: Arc<dyn AuthenticationService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires both stores onto the same storage backend. The collection lives under
    /// the configured key.
    pub fn new(
        backend: Arc<dyn KeyValueBackend>,
        summarizer: Arc<dyn SummarizationService>,
        auth: Arc<dyn AuthenticationService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store: Arc::new(CollectionStore::new(
                backend.clone(),
                config.collection_key.clone(),
            )),
            sessions: Arc::new(AuthSessionStore::new(backend)),
            summarizer,
            auth,
            config,
        }
    }
}
