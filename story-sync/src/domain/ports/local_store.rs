//! Port for durable, collection-partitioned local storage.
//!
//! Records are JSON documents grouped into named collections. Each collection
//! declares its primary-key kind and the secondary indexes it can be ordered
//! by. Adapters must make writes visible to every later read on the same
//! store instance.

use async_trait::async_trait;
use serde_json::Value;

use super::define_port_error;

/// Schema version applied by [`LocalStore::initialize`].
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// How a collection assigns primary keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Caller-supplied text key (server ids).
    Text,
    /// Store-assigned increasing sequence.
    AutoIncrement,
}

/// Secondary index that a collection may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionIndex {
    /// Creation time (`createdAt`).
    CreatedAt,
    /// Story sync status (`syncStatus`).
    SyncStatus,
    /// Pending lifecycle status (`status`).
    Status,
    /// Queue timestamp (`timestamp`).
    Timestamp,
    /// Queue entry type (`type`).
    Kind,
}

impl CollectionIndex {
    /// Top-level JSON field backing the index.
    pub const fn field(self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::SyncStatus => "syncStatus",
            Self::Status => "status",
            Self::Timestamp => "timestamp",
            Self::Kind => "type",
        }
    }
}

/// Named collections of the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Stories confirmed by the remote service.
    Stories,
    /// Locally authored stories awaiting submission.
    PendingStories,
    /// Reserved queue collection.
    SyncQueue,
    /// User favourites.
    Favorites,
}

impl Collection {
    /// Every collection, in schema order.
    pub const ALL: [Self; 4] = [
        Self::Stories,
        Self::PendingStories,
        Self::SyncQueue,
        Self::Favorites,
    ];

    /// Stable storage name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stories => "stories",
            Self::PendingStories => "pending_stories",
            Self::SyncQueue => "sync_queue",
            Self::Favorites => "favorites",
        }
    }

    /// Primary-key kind.
    pub const fn key_kind(self) -> KeyKind {
        match self {
            Self::Stories | Self::Favorites => KeyKind::Text,
            Self::PendingStories | Self::SyncQueue => KeyKind::AutoIncrement,
        }
    }

    /// Declared secondary indexes.
    pub const fn indexes(self) -> &'static [CollectionIndex] {
        match self {
            Self::Stories => &[CollectionIndex::CreatedAt, CollectionIndex::SyncStatus],
            Self::PendingStories => &[CollectionIndex::CreatedAt, CollectionIndex::Status],
            Self::SyncQueue => &[CollectionIndex::Timestamp, CollectionIndex::Kind],
            Self::Favorites => &[CollectionIndex::CreatedAt],
        }
    }

    /// Whether `index` is declared on this collection.
    pub fn has_index(self, index: CollectionIndex) -> bool {
        self.indexes().contains(&index)
    }

    /// Schema version that introduced the collection.
    pub const fn introduced_in(self) -> u32 {
        match self {
            Self::Stories | Self::PendingStories => 1,
            Self::SyncQueue | Self::Favorites => 2,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Primary key of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    /// Text key (server id).
    Text(String),
    /// Store-assigned sequence number.
    Sequence(i64),
}

impl RecordKey {
    /// Key kind this value belongs to.
    pub const fn kind(&self) -> KeyKind {
        match self {
            Self::Text(_) => KeyKind::Text,
            Self::Sequence(_) => KeyKind::AutoIncrement,
        }
    }

    /// Sequence value, when this is a sequence key.
    pub const fn as_sequence(&self) -> Option<i64> {
        match self {
            Self::Sequence(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Sequence(value) => write!(f, "{value}"),
        }
    }
}

/// A record read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Primary key.
    pub key: RecordKey,
    /// JSON body as written.
    pub body: Value,
}

define_port_error! {
    /// Errors raised by local store adapters.
    pub enum LocalStoreError {
        /// An operation ran before `initialize` or after `shutdown`.
        NotInitialized => "local store is not initialised",
        /// The platform denied access to the underlying storage.
        Unavailable { message: String } => "local store unavailable: {message}",
        /// A read or write failed during execution.
        Query { message: String } => "local store query failed: {message}",
        /// The key does not match the collection's key kind.
        InvalidKey { message: String } => "invalid record key: {message}",
        /// The collection does not declare the requested index.
        UnknownIndex { collection: String, index: String } =>
            "collection {collection} has no index {index}",
        /// A stored document could not be encoded or decoded.
        Serialization { message: String } => "local store serialisation failed: {message}",
    }
}

impl LocalStoreError {
    /// Whether the failure means the store as a whole cannot be used.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::Unavailable { .. })
    }
}

/// Validate `key` against `collection` for a `put`.
///
/// Returns `Ok(None)` when the store should assign a fresh sequence.
pub fn check_put_key(
    collection: Collection,
    key: Option<RecordKey>,
) -> Result<Option<RecordKey>, LocalStoreError> {
    match (collection.key_kind(), key) {
        (KeyKind::AutoIncrement, None) => Ok(None),
        (KeyKind::Text, None) => Err(LocalStoreError::invalid_key(format!(
            "{collection} requires an explicit text key"
        ))),
        (kind, Some(key)) if key.kind() == kind => Ok(Some(key)),
        (_, Some(key)) => Err(LocalStoreError::invalid_key(format!(
            "{collection} cannot store key {key}"
        ))),
    }
}

/// Validate that `index` is declared on `collection`.
pub fn check_index(collection: Collection, index: CollectionIndex) -> Result<(), LocalStoreError> {
    if collection.has_index(index) {
        Ok(())
    } else {
        Err(LocalStoreError::unknown_index(
            collection.name(),
            index.field(),
        ))
    }
}

/// Port for the local persistent store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Open or create the store and apply pending schema migrations.
    ///
    /// Calling this on an open store is a no-op.
    async fn initialize(&self) -> Result<(), LocalStoreError>;

    /// Release the underlying storage handle. Later calls need a fresh
    /// `initialize`.
    async fn shutdown(&self) -> Result<(), LocalStoreError>;

    /// Applied schema version.
    async fn schema_version(&self) -> Result<u32, LocalStoreError>;

    /// Insert or replace a record and return its key.
    ///
    /// Passing `None` on an auto-increment collection assigns the next
    /// sequence number.
    async fn put(
        &self,
        collection: Collection,
        key: Option<RecordKey>,
        body: Value,
    ) -> Result<RecordKey, LocalStoreError>;

    /// All records in ascending primary-key order.
    async fn get_all(&self, collection: Collection) -> Result<Vec<StoredDocument>, LocalStoreError>;

    /// All records ordered by a declared secondary index, ties broken by key.
    async fn get_all_by_index(
        &self,
        collection: Collection,
        index: CollectionIndex,
    ) -> Result<Vec<StoredDocument>, LocalStoreError>;

    /// Point lookup.
    async fn get_by_key(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<Option<StoredDocument>, LocalStoreError>;

    /// Point removal.
    ///
    /// Returns `true` when a record was removed and `false` when the key was
    /// absent; an absent key is not an error.
    async fn delete(&self, collection: Collection, key: &RecordKey) -> Result<bool, LocalStoreError>;

    /// Number of records in the collection.
    async fn count(&self, collection: Collection) -> Result<u64, LocalStoreError>;

    /// Remove every record from the collection.
    async fn clear(&self, collection: Collection) -> Result<(), LocalStoreError>;

    /// Read a named marker such as the last sync time.
    async fn read_marker(&self, name: &str) -> Result<Option<String>, LocalStoreError>;

    /// Write a named marker.
    async fn write_marker(&self, name: &str, value: &str) -> Result<(), LocalStoreError>;
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Collection::Stories, KeyKind::Text)]
    #[case(Collection::PendingStories, KeyKind::AutoIncrement)]
    #[case(Collection::SyncQueue, KeyKind::AutoIncrement)]
    #[case(Collection::Favorites, KeyKind::Text)]
    fn collections_declare_key_kinds(#[case] collection: Collection, #[case] kind: KeyKind) {
        assert_eq!(collection.key_kind(), kind);
    }

    #[rstest]
    fn auto_increment_collections_accept_missing_keys() {
        let key = check_put_key(Collection::PendingStories, None).expect("key accepted");
        assert!(key.is_none());
    }

    #[rstest]
    fn text_collections_require_keys() {
        let err = check_put_key(Collection::Favorites, None).expect_err("missing key rejected");
        assert!(matches!(err, LocalStoreError::InvalidKey { .. }));
    }

    #[rstest]
    fn mismatched_key_kinds_are_rejected() {
        let err = check_put_key(Collection::Stories, Some(RecordKey::Sequence(3)))
            .expect_err("sequence key rejected");
        assert!(err.to_string().contains("stories"));
    }

    #[rstest]
    #[case(Collection::PendingStories, CollectionIndex::Status, true)]
    #[case(Collection::PendingStories, CollectionIndex::SyncStatus, false)]
    #[case(Collection::Favorites, CollectionIndex::CreatedAt, true)]
    #[case(Collection::SyncQueue, CollectionIndex::Kind, true)]
    fn index_declarations_are_checked(
        #[case] collection: Collection,
        #[case] index: CollectionIndex,
        #[case] ok: bool,
    ) {
        assert_eq!(check_index(collection, index).is_ok(), ok);
    }

    #[rstest]
    fn unavailable_errors_are_classified() {
        assert!(LocalStoreError::not_initialized().is_unavailable());
        assert!(LocalStoreError::unavailable("denied").is_unavailable());
        assert!(!LocalStoreError::query("syntax").is_unavailable());
    }
}
