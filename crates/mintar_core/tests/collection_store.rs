use async_trait::async_trait;
use mintar_core::{
    CollectionStore, FileInfo, InMemoryBackend, KeyValueBackend, PortError, PortResult,
    PracticeQuestion, SavedRecord, StoreError, StudySummary, TopicEntry,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

const KEY: &str = "saved_records_test";

fn record(id: &str, saved_at: &str) -> SavedRecord {
    let summary = StudySummary {
        file_info: FileInfo {
            original_name: format!("{}.pdf", id),
            size: 1024,
            uploaded_at: saved_at.to_string(),
            ..FileInfo::default()
        },
        materials: vec![TopicEntry {
            title: "Fotosintesis".to_string(),
            summary: "Tumbuhan mengubah cahaya menjadi energi.".to_string(),
            key_points: vec!["Klorofil".to_string(), "Cahaya matahari".to_string()],
            practice_questions: vec![PracticeQuestion {
                id: "q1".to_string(),
                question: "Apa pigmen utama?".to_string(),
                choices: vec!["Klorofil".to_string(), "Karoten".to_string()],
                answer: "Klorofil".to_string(),
            }],
        }],
    };
    SavedRecord::new(id, saved_at, &summary)
}

fn setup() -> (Arc<InMemoryBackend>, CollectionStore) {
    let backend = Arc::new(InMemoryBackend::new());
    let store = CollectionStore::new(backend.clone(), KEY);
    (backend, store)
}

fn ids(records: &[SavedRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

async fn raw_entries(backend: &InMemoryBackend) -> Vec<Value> {
    let raw = backend.get(KEY).await.unwrap().unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn append_then_get_by_id_roundtrip() {
    let (_, store) = setup();
    let r = record("a1", "2024-01-01T00:00:00Z");

    store.append(r.clone()).await.unwrap();

    let loaded = store.get_by_id("a1").await.unwrap().unwrap();
    assert_eq!(loaded, r);
}

#[tokio::test]
async fn list_on_missing_key_is_empty() {
    let (_, store) = setup();
    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(store.get_by_id("nope").await.unwrap(), None);
}

#[tokio::test]
async fn list_orders_newest_first_regardless_of_insertion_order() {
    let (_, store) = setup();
    store.append(record("t2", "2024-02-01T00:00:00Z")).await.unwrap();
    store.append(record("t1", "2024-01-01T00:00:00Z")).await.unwrap();
    store.append(record("t3", "2024-03-01T00:00:00Z")).await.unwrap();

    let listed = store.list().await.unwrap();
    assert_eq!(ids(&listed), vec!["t3", "t2", "t1"]);
}

#[tokio::test]
async fn list_compares_instants_not_strings() {
    let (_, store) = setup();
    store.append(record("utc", "2024-01-01T10:00:00Z")).await.unwrap();
    // 09:00 UTC, but lexically greater.
    store.append(record("offset", "2024-01-01T11:00:00+02:00")).await.unwrap();

    assert_eq!(ids(&store.list().await.unwrap()), vec!["utc", "offset"]);
}

#[tokio::test]
async fn list_keeps_persisted_order_for_equal_timestamps() {
    let (_, store) = setup();
    let same = "2024-05-05T05:05:05.000Z";
    store.append(record("first", same)).await.unwrap();
    store.append(record("second", same)).await.unwrap();
    store.append(record("third", same)).await.unwrap();

    for _ in 0..3 {
        assert_eq!(ids(&store.list().await.unwrap()), vec!["third", "second", "first"]);
    }
}

#[tokio::test]
async fn list_puts_unparseable_timestamps_last() {
    let (_, store) = setup();
    store.append(record("dated", "2024-01-01T00:00:00Z")).await.unwrap();
    store.append(record("undated", "yesterday")).await.unwrap();

    assert_eq!(ids(&store.list().await.unwrap()), vec!["dated", "undated"]);
}

#[tokio::test]
async fn append_prepends_and_returns_snapshot() {
    let (backend, store) = setup();
    store.append(record("old", "2024-06-01T00:00:00Z")).await.unwrap();
    let snapshot = store.append(record("new", "2024-01-01T00:00:00Z")).await.unwrap();

    assert_eq!(ids(&snapshot.records), vec!["new", "old"]);
    assert_eq!(snapshot.invalid_entries, 0);

    let raw = raw_entries(&backend).await;
    assert_eq!(raw[0]["id"], "new");
    assert_eq!(raw[1]["id"], "old");
}

#[tokio::test]
async fn delete_twice_is_idempotent() {
    let (_, store) = setup();
    store.append(record("a", "2024-01-01T00:00:00Z")).await.unwrap();
    store.append(record("b", "2024-02-01T00:00:00Z")).await.unwrap();

    let first = store.delete_by_id("a").await.unwrap();
    let second = store.delete_by_id("a").await.unwrap();

    assert_eq!(ids(&first.records), vec!["b"]);
    assert_eq!(first, second);
    assert_eq!(ids(&store.list().await.unwrap()), vec!["b"]);
}

#[tokio::test]
async fn delete_on_missing_key_succeeds() {
    let (backend, store) = setup();
    let snapshot = store.delete_by_id("ghost").await.unwrap();
    assert!(snapshot.is_empty());
    assert!(backend.is_empty().await);
}

#[tokio::test]
async fn corrupted_blob_is_reset_by_list() {
    let (backend, store) = setup();
    backend.set(KEY, "not json").await.unwrap();

    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(backend.get(KEY).await.unwrap(), None);

    let r = record("fresh", "2024-01-01T00:00:00Z");
    let snapshot = store.append(r.clone()).await.unwrap();
    assert_eq!(snapshot.records, vec![r.clone()]);
    assert_eq!(store.list().await.unwrap(), vec![r]);
}

#[tokio::test]
async fn non_array_blob_counts_as_corruption() {
    let (backend, store) = setup();
    backend.set(KEY, r#"{"id":"a1","savedAt":"2024-01-01T00:00:00Z"}"#).await.unwrap();

    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(backend.get(KEY).await.unwrap(), None);
}

#[tokio::test]
async fn append_over_corrupted_blob_starts_a_new_collection() {
    let (backend, store) = setup();
    backend.set(KEY, "{{{").await.unwrap();

    let snapshot = store.append(record("x", "2024-01-01T00:00:00Z")).await.unwrap();
    assert_eq!(ids(&snapshot.records), vec!["x"]);
    assert_eq!(raw_entries(&backend).await.len(), 1);
}

#[tokio::test]
async fn delete_leaves_unreadable_blob_untouched() {
    let (backend, store) = setup();
    backend.set(KEY, "not json").await.unwrap();

    let snapshot = store.delete_by_id("a1").await.unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(backend.get(KEY).await.unwrap().as_deref(), Some("not json"));
}

#[tokio::test]
async fn invalid_entries_are_hidden_but_kept() {
    let (backend, store) = setup();
    let good = record("good", "2024-01-01T00:00:00Z");
    let blob = json!([
        serde_json::to_value(&good).unwrap(),
        { "savedAt": "2024-02-01T00:00:00Z", "note": "missing id" },
        { "id": "other", "savedAt": "2024-03-01T00:00:00Z" }
    ]);
    backend.set(KEY, &blob.to_string()).await.unwrap();

    let listed = store.list().await.unwrap();
    assert_eq!(ids(&listed), vec!["other", "good"]);
    // Listing never rewrites storage.
    assert_eq!(raw_entries(&backend).await.len(), 3);

    let snapshot = store.delete_by_id("other").await.unwrap();
    assert_eq!(ids(&snapshot.records), vec!["good"]);
    assert_eq!(snapshot.invalid_entries, 1);

    let raw = raw_entries(&backend).await;
    assert_eq!(raw.len(), 2);
    assert!(raw.iter().any(|e| e["note"] == "missing id"));
}

#[tokio::test]
async fn deleting_last_record_removes_the_key() {
    let (backend, store) = setup();
    store.append(record("only", "2024-01-01T00:00:00Z")).await.unwrap();

    let snapshot = store.delete_by_id("only").await.unwrap();

    assert!(snapshot.is_empty());
    assert_eq!(backend.get(KEY).await.unwrap(), None);
}

#[tokio::test]
async fn delete_does_not_coerce_numeric_ids() {
    let (backend, store) = setup();
    backend
        .set(KEY, r#"[{"id":42,"savedAt":"2024-01-01T00:00:00Z"}]"#)
        .await
        .unwrap();

    assert_eq!(ids(&store.list().await.unwrap()), vec!["42"]);

    store.delete_by_id("42").await.unwrap();
    assert_eq!(raw_entries(&backend).await.len(), 1);
}

#[tokio::test]
async fn payloads_of_any_shape_are_listed_and_returned_unchanged() {
    let (backend, store) = setup();
    let entries = vec![
        json!({"id": "null-file", "savedAt": "2024-01-05T00:00:00Z", "fileInfo": null, "materials": []}),
        json!({
            "id": "fractional-size",
            "savedAt": "2024-01-04T00:00:00Z",
            "fileInfo": {"originalName": "a.pdf", "size": 12.5, "uploadedAt": "2024-01-04T00:00:00Z"}
        }),
        json!({
            "id": "numeric-answer",
            "savedAt": "2024-01-03T00:00:00Z",
            "materials": [{"title": "Sel", "practiceQuestions": [{"question": "?", "choices": ["a", "b"], "answer": 2}]}]
        }),
        json!({"id": "opaque", "savedAt": "2024-01-02T00:00:00Z", "materials": "opaque", "pinned": true}),
        json!({
            "id": "upload-response",
            "savedAt": "2024-01-01T00:00:00Z",
            "success": true,
            "message": "Berhasil",
            "data": {"materi": [{"judul": "Sejarah", "soalLatihan": []}]},
            "fileInfo": {"originalName": "sejarah.pdf", "size": 300}
        }),
    ];
    backend
        .set(KEY, &Value::Array(entries.clone()).to_string())
        .await
        .unwrap();

    let listed = store.list().await.unwrap();
    assert_eq!(
        ids(&listed),
        vec!["null-file", "fractional-size", "numeric-answer", "opaque", "upload-response"]
    );

    for entry in &entries {
        let id = entry["id"].as_str().unwrap();
        let loaded = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(&serde_json::to_value(&loaded).unwrap(), entry, "entry {}", id);
    }

    // A rewrite carries the untouched entries through verbatim.
    store.delete_by_id("opaque").await.unwrap();
    let raw = raw_entries(&backend).await;
    assert_eq!(raw.len(), 4);
    assert!(raw.contains(&entries[4]));
}

#[tokio::test]
async fn concrete_save_list_delete_scenario() {
    let (_, store) = setup();
    let a = record("a1", "2024-01-01T00:00:00Z");
    let b = record("b2", "2024-06-01T00:00:00Z");

    store.append(a.clone()).await.unwrap();
    store.append(b.clone()).await.unwrap();
    assert_eq!(store.list().await.unwrap(), vec![b.clone(), a]);

    store.delete_by_id("a1").await.unwrap();
    assert_eq!(store.list().await.unwrap(), vec![b.clone()]);

    store.delete_by_id("a1").await.unwrap();
    assert_eq!(store.list().await.unwrap(), vec![b]);
}

#[tokio::test]
async fn stores_with_different_keys_are_isolated() {
    let backend = Arc::new(InMemoryBackend::new());
    let left = CollectionStore::new(backend.clone(), "left");
    let right = CollectionStore::new(backend.clone(), "right");

    left.append(record("l", "2024-01-01T00:00:00Z")).await.unwrap();

    assert_eq!(left.list().await.unwrap().len(), 1);
    assert!(right.list().await.unwrap().is_empty());
    assert_eq!(right.key(), "right");
}

//=========================================================================================
// Backend failures and concurrency
//=========================================================================================

/// Fails every write after a given number of successful ones.
struct FailingWrites {
    inner: InMemoryBackend,
    allowed_writes: AtomicUsize,
}

#[async_trait]
impl KeyValueBackend for FailingWrites {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        if self
            .allowed_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return Err(PortError::Io("secure storage unavailable".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        self.inner.delete(key).await
    }
}

#[tokio::test]
async fn failed_write_surfaces_persistence_error_and_keeps_state() {
    let backend = Arc::new(FailingWrites {
        inner: InMemoryBackend::new(),
        allowed_writes: AtomicUsize::new(1),
    });
    let store = CollectionStore::new(backend.clone(), KEY);
    store.append(record("kept", "2024-01-01T00:00:00Z")).await.unwrap();

    let err = store
        .append(record("lost", "2024-02-01T00:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Persistence(PortError::Io(_))));

    assert_eq!(ids(&store.list().await.unwrap()), vec!["kept"]);
}

/// Fails whichever backend calls are switched off.
#[derive(Default)]
struct FlakyBackend {
    inner: InMemoryBackend,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyBackend {
    fn check(flag: &AtomicBool, call: &str) -> PortResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(PortError::Io(format!("{} failed", call)));
        }
        Ok(())
    }

    async fn blob(&self) -> Option<String> {
        self.inner.get(KEY).await.unwrap()
    }
}

#[async_trait]
impl KeyValueBackend for FlakyBackend {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Self::check(&self.fail_get, "get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        Self::check(&self.fail_set, "set")?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(key).await
    }
}

async fn flaky_store(records: &[SavedRecord]) -> (Arc<FlakyBackend>, CollectionStore) {
    let backend = Arc::new(FlakyBackend::default());
    let store = CollectionStore::new(backend.clone(), KEY);
    for r in records {
        store.append(r.clone()).await.unwrap();
    }
    (backend, store)
}

#[tokio::test]
async fn failed_read_surfaces_persistence_error() {
    let (backend, store) = flaky_store(&[record("a", "2024-01-01T00:00:00Z")]).await;
    let before = backend.blob().await;
    backend.fail_get.store(true, Ordering::SeqCst);

    assert!(matches!(store.list().await, Err(StoreError::Persistence(PortError::Io(_)))));
    assert!(matches!(
        store.get_by_id("a").await,
        Err(StoreError::Persistence(PortError::Io(_)))
    ));
    assert!(matches!(
        store.delete_by_id("a").await,
        Err(StoreError::Persistence(PortError::Io(_)))
    ));
    assert_eq!(backend.blob().await, before);
}

#[tokio::test]
async fn failed_rewrite_during_delete_keeps_the_blob() {
    let (backend, store) = flaky_store(&[
        record("a", "2024-01-01T00:00:00Z"),
        record("b", "2024-02-01T00:00:00Z"),
    ])
    .await;
    let before = backend.blob().await;
    backend.fail_set.store(true, Ordering::SeqCst);

    let err = store.delete_by_id("a").await.unwrap_err();
    assert!(matches!(err, StoreError::Persistence(PortError::Io(_))));
    assert_eq!(backend.blob().await, before);

    backend.fail_set.store(false, Ordering::SeqCst);
    assert_eq!(ids(&store.list().await.unwrap()), vec!["b", "a"]);
}

#[tokio::test]
async fn failed_key_removal_during_delete_keeps_the_blob() {
    let (backend, store) = flaky_store(&[record("only", "2024-01-01T00:00:00Z")]).await;
    let before = backend.blob().await;
    backend.fail_delete.store(true, Ordering::SeqCst);

    let err = store.delete_by_id("only").await.unwrap_err();
    assert!(matches!(err, StoreError::Persistence(PortError::Io(_))));
    assert_eq!(backend.blob().await, before);
    assert_eq!(ids(&store.list().await.unwrap()), vec!["only"]);
}

/// Holds every read until two readers have arrived.
struct LockstepReads {
    inner: InMemoryBackend,
    barrier: Barrier,
}

#[async_trait]
impl KeyValueBackend for LockstepReads {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let value = self.inner.get(key).await;
        self.barrier.wait().await;
        value
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        self.inner.delete(key).await
    }
}

#[tokio::test]
async fn concurrent_appends_race_and_last_writer_wins() {
    let backend = Arc::new(LockstepReads {
        inner: InMemoryBackend::new(),
        barrier: Barrier::new(2),
    });
    let store = CollectionStore::new(backend.clone(), KEY);

    let (first, second) = tokio::join!(
        store.append(record("one", "2024-01-01T00:00:00Z")),
        store.append(record("two", "2024-01-02T00:00:00Z")),
    );
    assert_eq!(first.unwrap().len(), 1);
    assert_eq!(second.unwrap().len(), 1);

    let raw = backend.inner.get(KEY).await.unwrap().unwrap();
    let entries: Vec<Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(entries.len(), 1);
}
