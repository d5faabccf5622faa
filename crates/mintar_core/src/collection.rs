//! crates/mintar_core/src/collection.rs
//!
//! The collection store: an ordered collection of saved records kept as a single
//! JSON array under one key of the key-value backend.
//!
//! Reads always go back to the backend. A blob that is not a JSON array is
//! treated as corrupted and resolved to an empty collection instead of failing
//! the caller. Writes are plain read-modify-write cycles with no locking, so two
//! concurrent writers can clobber each other.

use std::cmp::Reverse;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::domain::{parse_instant, SavedRecord};
use crate::ports::{KeyValueBackend, PortError};

/// The storage key used by the application when none is configured.
pub const DEFAULT_COLLECTION_KEY: &str = "saved_api_data";

//=========================================================================================
// Errors and Results
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend failed at the I/O level. Never retried.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PortError),
    #[error("Failed to encode the collection: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The collection as it stands after a write, in persisted order (most recently
/// appended first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSnapshot {
    pub records: Vec<SavedRecord>,
    /// Malformed entries that are still persisted but never surfaced.
    pub invalid_entries: usize,
}

impl CollectionSnapshot {
    fn from_entries(entries: &[Value]) -> Self {
        let mut snapshot = Self::default();
        for entry in entries {
            match validate_entry(entry) {
                Some(record) => snapshot.records.push(record),
                None => snapshot.invalid_entries += 1,
            }
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SavedRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

//=========================================================================================
// Decoding
//=========================================================================================

/// Outcome of decoding the raw blob stored under the collection key.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The blob is a JSON array. Entries are returned untouched, valid or not.
    Valid(Vec<Value>),
    /// The blob is not JSON, or not an array.
    Corrupted(String),
}

/// Decodes the persisted blob. Shared by every store operation.
pub fn decode(raw: &str) -> Decoded {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => Decoded::Valid(entries),
        Ok(other) => Decoded::Corrupted(format!("expected an array, found {}", json_kind(&other))),
        Err(e) => Decoded::Corrupted(e.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Truthiness the way the stored data was written: empty strings, zero, false
/// and null all count as missing.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn envelope_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An entry is surfaced only if it is an object with a truthy `id` and
/// `savedAt`. The rest of the entry is carried as an opaque payload.
fn validate_entry(entry: &Value) -> Option<SavedRecord> {
    let object = entry.as_object()?;
    let id = object.get("id").filter(|v| is_truthy(v))?;
    let saved_at = object.get("savedAt").filter(|v| is_truthy(v))?;

    let mut payload = object.clone();
    payload.remove("id");
    payload.remove("savedAt");
    Some(SavedRecord {
        id: envelope_text(id),
        saved_at: envelope_text(saved_at),
        payload,
    })
}

/// Exact string match on `id`. Entries without an id are never matched.
fn matches_id(entry: &Value, id: &str) -> bool {
    matches!(entry.get("id"), Some(Value::String(s)) if !s.is_empty() && s == id)
}

//=========================================================================================
// The Store
//=========================================================================================

/// Durable, ordered collection of [`SavedRecord`]s under one storage key.
#[derive(Clone)]
pub struct CollectionStore {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
}

impl CollectionStore {
    /// Creates a store owning `key` in the given backend.
    pub fn new(backend: Arc<dyn KeyValueBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn read(&self) -> StoreResult<Option<Decoded>> {
        let raw = self.backend.get(&self.key).await?;
        Ok(raw.as_deref().map(decode))
    }

    async fn write(&self, entries: &[Value]) -> StoreResult<()> {
        let blob = serde_json::to_string(entries)?;
        self.backend.set(&self.key, &blob).await?;
        Ok(())
    }

    /// Prepends `record` to the persisted collection.
    ///
    /// Performs exactly one read and one write. A corrupted blob is replaced by a
    /// collection holding only the new record.
    pub async fn append(&self, record: SavedRecord) -> StoreResult<CollectionSnapshot> {
        let mut entries = match self.read().await? {
            None => Vec::new(),
            Some(Decoded::Valid(entries)) => entries,
            Some(Decoded::Corrupted(reason)) => {
                warn!(key = %self.key, %reason, "Stored collection is corrupted; starting over");
                Vec::new()
            }
        };

        let id = record.id.clone();
        entries.insert(0, serde_json::to_value(&record)?);
        self.write(&entries).await?;

        info!(key = %self.key, %id, total = entries.len(), "Saved record appended");
        Ok(CollectionSnapshot::from_entries(&entries))
    }

    /// Lists the valid records, newest `savedAt` first.
    ///
    /// Ties and unparseable timestamps keep their persisted relative order, the
    /// latter after every dated record. Malformed entries are skipped but left in
    /// storage. A corrupted blob is erased and reported as an empty collection.
    pub async fn list(&self) -> StoreResult<Vec<SavedRecord>> {
        let entries = match self.read().await? {
            None => {
                debug!(key = %self.key, "No saved collection");
                return Ok(Vec::new());
            }
            Some(Decoded::Valid(entries)) => entries,
            Some(Decoded::Corrupted(reason)) => {
                warn!(key = %self.key, %reason, "Stored collection is corrupted; resetting it");
                if let Err(e) = self.backend.delete(&self.key).await {
                    error!(key = %self.key, "Failed to erase corrupted collection: {}", e);
                }
                return Ok(Vec::new());
            }
        };

        let snapshot = CollectionSnapshot::from_entries(&entries);
        if snapshot.invalid_entries > 0 {
            warn!(
                key = %self.key,
                skipped = snapshot.invalid_entries,
                "Filtered out invalid saved entries"
            );
        }

        let mut records = snapshot.records;
        records.sort_by_cached_key(|r| Reverse(parse_instant(&r.saved_at)));
        debug!(key = %self.key, count = records.len(), "Loaded saved records");
        Ok(records)
    }

    /// Looks a record up by exact id. Absence is `Ok(None)`.
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<SavedRecord>> {
        let records = self.list().await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    /// Removes every entry whose `id` equals `id`.
    ///
    /// Deleting an unknown id is a successful no-op and writes nothing. Entries
    /// without an id are always kept. When the last entry goes, the key itself is
    /// deleted so that "absent" and "empty" stay the same state. An unreadable blob
    /// is treated as an empty collection and left as is.
    pub async fn delete_by_id(&self, id: &str) -> StoreResult<CollectionSnapshot> {
        let entries = match self.read().await? {
            None => {
                debug!(key = %self.key, %id, "Nothing stored; delete is a no-op");
                return Ok(CollectionSnapshot::default());
            }
            Some(Decoded::Valid(entries)) => entries,
            Some(Decoded::Corrupted(reason)) => {
                warn!(key = %self.key, %id, %reason, "Stored collection is unreadable; nothing to delete");
                return Ok(CollectionSnapshot::default());
            }
        };

        let before = entries.len();
        let remaining: Vec<Value> = entries
            .into_iter()
            .filter(|entry| !matches_id(entry, id))
            .collect();

        if remaining.len() == before {
            debug!(key = %self.key, %id, "No saved record with this id");
            return Ok(CollectionSnapshot::from_entries(&remaining));
        }

        if remaining.is_empty() {
            self.backend.delete(&self.key).await?;
        } else {
            self.write(&remaining).await?;
        }

        info!(key = %self.key, %id, remaining = remaining.len(), "Saved record deleted");
        Ok(CollectionSnapshot::from_entries(&remaining))
    }
}
