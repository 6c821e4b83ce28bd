//! In-process local store adapter.
//!
//! Provides the full `LocalStore` contract without touching disk. Data
//! survives `shutdown`/`initialize` cycles for the lifetime of the value, so
//! tests can model an application restart against the same store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::ports::{
    CURRENT_SCHEMA_VERSION, Collection, CollectionIndex, LocalStore, LocalStoreError, RecordKey,
    StoredDocument, check_index, check_put_key,
};

#[derive(Debug, Default)]
struct MemoryState {
    open: bool,
    collections: BTreeMap<Collection, BTreeMap<RecordKey, Value>>,
    sequences: HashMap<Collection, i64>,
    markers: HashMap<String, String>,
}

impl MemoryState {
    fn ensure_open(&self) -> Result<(), LocalStoreError> {
        if self.open {
            Ok(())
        } else {
            Err(LocalStoreError::not_initialized())
        }
    }

    fn records(&self, collection: Collection) -> impl Iterator<Item = (&RecordKey, &Value)> {
        self.collections
            .get(&collection)
            .into_iter()
            .flat_map(BTreeMap::iter)
    }

    fn next_sequence(&mut self, collection: Collection) -> i64 {
        let counter = self.sequences.entry(collection).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    fn bump_sequence(&mut self, collection: Collection, key: &RecordKey) {
        if let Some(value) = key.as_sequence() {
            let counter = self.sequences.entry(collection).or_insert(0);
            *counter = (*counter).max(value);
        }
    }
}

/// `LocalStore` kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLocalStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl InMemoryLocalStore {
    /// Create an empty, uninitialised store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call fail with `Unavailable` until reset.
    ///
    /// Simulates the platform denying access to storage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, LocalStoreError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(LocalStoreError::unavailable("storage access denied"));
        }
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn open_state(&self) -> Result<MutexGuard<'_, MemoryState>, LocalStoreError> {
        let state = self.lock()?;
        state.ensure_open()?;
        Ok(state)
    }
}

fn documents<'a>(records: impl Iterator<Item = (&'a RecordKey, &'a Value)>) -> Vec<StoredDocument> {
    records
        .map(|(key, body)| StoredDocument {
            key: key.clone(),
            body: body.clone(),
        })
        .collect()
}

/// Order index values the way SQLite orders `json_extract` results:
/// missing/null first, then numbers, then text.
fn compare_index_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_) | Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Array(_) | Value::Object(_)) => 3,
        }
    }

    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or_default();
            let b = b.as_f64().unwrap_or_default();
            a.total_cmp(&b)
        }
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a @ (Value::Array(_) | Value::Object(_))), Some(b @ (Value::Array(_) | Value::Object(_)))) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => rank(left).cmp(&rank(right)),
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn initialize(&self) -> Result<(), LocalStoreError> {
        let mut state = self.lock()?;
        if !state.open {
            state.open = true;
            debug!("in-memory local store opened");
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), LocalStoreError> {
        let mut state = self.lock()?;
        state.open = false;
        Ok(())
    }

    async fn schema_version(&self) -> Result<u32, LocalStoreError> {
        self.lock()?.ensure_open()?;
        Ok(CURRENT_SCHEMA_VERSION)
    }

    async fn put(
        &self,
        collection: Collection,
        key: Option<RecordKey>,
        body: Value,
    ) -> Result<RecordKey, LocalStoreError> {
        let checked = check_put_key(collection, key)?;
        let mut state = self.open_state()?;
        let key = match checked {
            Some(key) => {
                state.bump_sequence(collection, &key);
                key
            }
            None => RecordKey::Sequence(state.next_sequence(collection)),
        };
        state
            .collections
            .entry(collection)
            .or_default()
            .insert(key.clone(), body);
        Ok(key)
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<StoredDocument>, LocalStoreError> {
        let state = self.open_state()?;
        Ok(documents(state.records(collection)))
    }

    async fn get_all_by_index(
        &self,
        collection: Collection,
        index: CollectionIndex,
    ) -> Result<Vec<StoredDocument>, LocalStoreError> {
        check_index(collection, index)?;
        let state = self.open_state()?;
        let field = index.field();
        let mut sorted = documents(state.records(collection));
        sorted.sort_by(|left, right| {
            compare_index_values(left.body.get(field), right.body.get(field))
                .then_with(|| left.key.cmp(&right.key))
        });
        Ok(sorted)
    }

    async fn get_by_key(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<Option<StoredDocument>, LocalStoreError> {
        let state = self.open_state()?;
        Ok(state
            .collections
            .get(&collection)
            .and_then(|records| records.get(key))
            .map(|body| StoredDocument {
                key: key.clone(),
                body: body.clone(),
            }))
    }

    async fn delete(&self, collection: Collection, key: &RecordKey) -> Result<bool, LocalStoreError> {
        let mut state = self.open_state()?;
        Ok(state
            .collections
            .get_mut(&collection)
            .and_then(|records| records.remove(key))
            .is_some())
    }

    async fn count(&self, collection: Collection) -> Result<u64, LocalStoreError> {
        let state = self.open_state()?;
        let total = state.records(collection).count();
        Ok(u64::try_from(total).unwrap_or(u64::MAX))
    }

    async fn clear(&self, collection: Collection) -> Result<(), LocalStoreError> {
        let mut state = self.open_state()?;
        state.collections.remove(&collection);
        Ok(())
    }

    async fn read_marker(&self, name: &str) -> Result<Option<String>, LocalStoreError> {
        let state = self.open_state()?;
        Ok(state.markers.get(name).cloned())
    }

    async fn write_marker(&self, name: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut state = self.open_state()?;
        state.markers.insert(name.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    #[fixture]
    fn store() -> InMemoryLocalStore {
        InMemoryLocalStore::new()
    }

    #[rstest]
    #[tokio::test]
    async fn calls_before_initialize_fail(store: InMemoryLocalStore) {
        let err = store
            .count(Collection::Stories)
            .await
            .expect_err("store not open");
        assert_eq!(err, LocalStoreError::NotInitialized);
    }

    #[rstest]
    #[tokio::test]
    async fn schema_version_requires_an_open_store(store: InMemoryLocalStore) {
        assert_eq!(
            store.schema_version().await,
            Err(LocalStoreError::NotInitialized)
        );

        store.initialize().await.expect("open");
        assert_eq!(
            store.schema_version().await.expect("version"),
            CURRENT_SCHEMA_VERSION
        );

        // The guard is released, so later calls do not deadlock.
        assert_eq!(store.count(Collection::Favorites).await.expect("count"), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn sequences_are_never_reused(store: InMemoryLocalStore) {
        store.initialize().await.expect("open");
        let first = store
            .put(Collection::PendingStories, None, json!({"n": 1}))
            .await
            .expect("put");
        store
            .delete(Collection::PendingStories, &first)
            .await
            .expect("delete");
        let second = store
            .put(Collection::PendingStories, None, json!({"n": 2}))
            .await
            .expect("put");

        assert_eq!(first, RecordKey::Sequence(1));
        assert_eq!(second, RecordKey::Sequence(2));
    }

    #[rstest]
    #[tokio::test]
    async fn data_survives_shutdown_and_reopen(store: InMemoryLocalStore) {
        store.initialize().await.expect("open");
        store
            .write_marker("last_sync_time", "2026-01-01T00:00:00Z")
            .await
            .expect("marker");
        store.shutdown().await.expect("close");
        assert!(store.read_marker("last_sync_time").await.is_err());

        store.initialize().await.expect("reopen");
        let marker = store.read_marker("last_sync_time").await.expect("marker");
        assert_eq!(marker.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[rstest]
    #[tokio::test]
    async fn index_ordering_breaks_ties_by_key(store: InMemoryLocalStore) {
        store.initialize().await.expect("open");
        for (id, created) in [("c", "2026-02-01"), ("a", "2026-03-01"), ("b", "2026-02-01")] {
            store
                .put(
                    Collection::Stories,
                    Some(RecordKey::Text(id.to_owned())),
                    json!({ "createdAt": created }),
                )
                .await
                .expect("put");
        }

        let ordered = store
            .get_all_by_index(Collection::Stories, CollectionIndex::CreatedAt)
            .await
            .expect("ordered read");
        let keys: Vec<_> = ordered.iter().map(|doc| doc.key.to_string()).collect();

        assert_eq!(keys, ["b", "c", "a"]);
    }

    #[rstest]
    #[tokio::test]
    async fn undeclared_indexes_are_rejected(store: InMemoryLocalStore) {
        store.initialize().await.expect("open");
        let err = store
            .get_all_by_index(Collection::Favorites, CollectionIndex::Status)
            .await
            .expect_err("undeclared index");
        assert!(matches!(err, LocalStoreError::UnknownIndex { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn simulated_denial_reports_unavailable(store: InMemoryLocalStore) {
        store.initialize().await.expect("open");
        store.set_unavailable(true);
        let err = store
            .get_all(Collection::PendingStories)
            .await
            .expect_err("denied");
        assert!(err.is_unavailable());
        store.set_unavailable(false);
        assert!(store.get_all(Collection::PendingStories).await.is_ok());
    }
}
