//! services/app/src/adapters/secure_store.rs
//!
//! The on-device storage adapter, a concrete implementation of the
//! `KeyValueBackend` port. Every key is one file inside the storage directory.

use async_trait::async_trait;
use mintar_core::ports::{KeyValueBackend, PortError, PortResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A file-backed key-value store. Writes go through a temporary file and a rename,
/// so a reader sees either the old or the new value, never a partial one.
#[derive(Clone, Debug)]
pub struct SecureFileStore {
    root: PathBuf,
}

impl SecureFileStore {
    /// Opens the store, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key to its file. Keys are limited to `[A-Za-z0-9._-]` and may not
    /// start with a dot.
    fn path_for(&self, key: &str) -> PortResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(PortError::Unexpected(format!("Invalid storage key '{}'", key)));
        }
        Ok(self.root.join(key))
    }
}

fn io_error(action: &str, key: &str, e: std::io::Error) -> PortError {
    PortError::Io(format!("failed to {} '{}': {}", action, key, e))
}

//=========================================================================================
// `KeyValueBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl KeyValueBackend for SecureFileStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", key, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", key, Uuid::new_v4().simple()));

        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| io_error("write", key, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error("replace", key, e));
        }

        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", key, e)),
        }
    }
}
