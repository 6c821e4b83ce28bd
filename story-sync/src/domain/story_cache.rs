//! Local cache of confirmed stories and storage statistics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::{debug, warn};

use crate::domain::ports::{Collection, CollectionIndex, LocalStore, RecordKey, RemoteStory};
use crate::domain::store_mapping::{decode_body, encode_body, map_store_error};
use crate::domain::{Error, Story, SyncStatus};

/// Marker holding the RFC 3339 time of the last completed drain pass.
pub const LAST_SYNC_MARKER: &str = "last_sync_time";

/// Counts shown in status views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Confirmed stories held locally.
    pub total_stories: u64,
    /// Staged stories awaiting sync.
    pub pending_sync: u64,
    /// Last completed drain pass, if any.
    pub last_sync: Option<DateTime<Utc>>,
}

/// Read/write access to the confirmed-story collection.
#[derive(Clone)]
pub struct StoryCache {
    store: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
}

impl StoryCache {
    /// Build a cache over `store`.
    pub fn new(store: Arc<dyn LocalStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Upsert a fresh remote listing, stamping each story `synced`.
    ///
    /// Returns the stories as written.
    pub async fn save_stories(&self, stories: Vec<RemoteStory>) -> Result<Vec<Story>, Error> {
        let now = self.clock.utc();
        let mut saved = Vec::with_capacity(stories.len());
        for remote in stories {
            let story = Story {
                id: remote.id,
                name: remote.name,
                description: remote.description,
                photo_url: remote.photo_url,
                created_at: remote.created_at,
                location: remote.location,
                sync_status: SyncStatus::Synced,
                last_updated: now,
            };
            let body = encode_body(&story)?;
            self.store
                .put(
                    Collection::Stories,
                    Some(RecordKey::Text(story.id.clone())),
                    body,
                )
                .await
                .map_err(map_store_error)?;
            saved.push(story);
        }
        debug!(count = saved.len(), "cached remote stories");
        Ok(saved)
    }

    /// Cached stories, newest first.
    pub async fn cached_stories(&self) -> Result<Vec<Story>, Error> {
        let documents = self
            .store
            .get_all_by_index(Collection::Stories, CollectionIndex::CreatedAt)
            .await
            .map_err(map_store_error)?;
        let mut stories = documents
            .iter()
            .map(decode_body::<Story>)
            .collect::<Result<Vec<_>, _>>()?;
        stories.reverse();
        Ok(stories)
    }

    /// Remove one cached story. Absent ids are ignored.
    pub async fn delete_story(&self, story_id: &str) -> Result<bool, Error> {
        self.store
            .delete(Collection::Stories, &RecordKey::Text(story_id.to_owned()))
            .await
            .map_err(map_store_error)
    }

    /// Confirmed and pending counts plus the last sync time.
    pub async fn stats(&self) -> Result<StorageStats, Error> {
        let total_stories = self
            .store
            .count(Collection::Stories)
            .await
            .map_err(map_store_error)?;
        let pending_sync = self
            .store
            .count(Collection::PendingStories)
            .await
            .map_err(map_store_error)?;
        let marker = self
            .store
            .read_marker(LAST_SYNC_MARKER)
            .await
            .map_err(map_store_error)?;
        Ok(StorageStats {
            total_stories,
            pending_sync,
            last_sync: marker.as_deref().and_then(parse_marker_time),
        })
    }

    /// Empty the stories, pending, and sync-queue collections.
    ///
    /// Favourites are left untouched.
    pub async fn clear_all(&self) -> Result<(), Error> {
        for collection in [
            Collection::Stories,
            Collection::PendingStories,
            Collection::SyncQueue,
        ] {
            self.store
                .clear(collection)
                .await
                .map_err(map_store_error)?;
        }
        Ok(())
    }
}

pub(crate) fn parse_marker_time(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(error) => {
            warn!(%error, raw, "ignoring malformed sync marker");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{LocalStoreError, MockLocalStore, StoredDocument};
    use crate::test_support::MutableClock;

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0)
            .single()
            .expect("valid time")
    }

    fn remote(id: &str) -> RemoteStory {
        RemoteStory {
            id: id.to_owned(),
            name: Some("Dewi".to_owned()),
            description: "Rice terraces".to_owned(),
            photo_url: None,
            created_at: Utc
                .with_ymd_and_hms(2026, 5, 30, 6, 0, 0)
                .single()
                .expect("valid time"),
            location: None,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn save_stories_marks_each_story_synced(now: DateTime<Utc>) {
        let mut store = MockLocalStore::new();
        store
            .expect_put()
            .withf(|collection, key, body| {
                *collection == Collection::Stories
                    && matches!(key, Some(RecordKey::Text(_)))
                    && body["syncStatus"] == "synced"
                    && body["lastUpdated"] == "2026-06-01T12:00:00Z"
            })
            .times(2)
            .returning(|_, key, _| Ok(key.unwrap_or(RecordKey::Sequence(0))));
        let cache = StoryCache::new(Arc::new(store), Arc::new(MutableClock::new(now)));

        let saved = cache
            .save_stories(vec![remote("story-a"), remote("story-b")])
            .await
            .expect("save succeeds");

        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|story| story.last_updated == now));
    }

    #[rstest]
    #[tokio::test]
    async fn cached_stories_are_newest_first(now: DateTime<Utc>) {
        let mut store = MockLocalStore::new();
        store.expect_get_all_by_index().returning(|_, _| {
            Ok(vec![
                StoredDocument {
                    key: RecordKey::Text("old".to_owned()),
                    body: json!({
                        "id": "old", "description": "a",
                        "createdAt": "2026-01-01T00:00:00Z",
                        "lastUpdated": "2026-01-01T00:00:00Z"
                    }),
                },
                StoredDocument {
                    key: RecordKey::Text("new".to_owned()),
                    body: json!({
                        "id": "new", "description": "b",
                        "createdAt": "2026-02-01T00:00:00Z",
                        "lastUpdated": "2026-02-01T00:00:00Z"
                    }),
                },
            ])
        });
        let cache = StoryCache::new(Arc::new(store), Arc::new(MutableClock::new(now)));

        let stories = cache.cached_stories().await.expect("read succeeds");
        let ids: Vec<_> = stories.iter().map(|story| story.id.as_str()).collect();

        assert_eq!(ids, ["new", "old"]);
    }

    #[rstest]
    #[tokio::test]
    async fn stats_reads_counts_and_marker(now: DateTime<Utc>) {
        let mut store = MockLocalStore::new();
        store.expect_count().returning(|collection| {
            Ok(match collection {
                Collection::Stories => 12,
                Collection::PendingStories => 3,
                _ => 0,
            })
        });
        store
            .expect_read_marker()
            .returning(|_| Ok(Some("2026-05-31T22:10:00Z".to_owned())));
        let cache = StoryCache::new(Arc::new(store), Arc::new(MutableClock::new(now)));

        let stats = cache.stats().await.expect("stats succeed");

        assert_eq!(stats.total_stories, 12);
        assert_eq!(stats.pending_sync, 3);
        assert_eq!(
            stats.last_sync,
            Utc.with_ymd_and_hms(2026, 5, 31, 22, 10, 0).single()
        );
    }

    #[rstest]
    #[tokio::test]
    async fn clear_all_leaves_favorites_alone(now: DateTime<Utc>) {
        let mut store = MockLocalStore::new();
        store
            .expect_clear()
            .withf(|collection| *collection != Collection::Favorites)
            .times(3)
            .returning(|_| Ok(()));
        let cache = StoryCache::new(Arc::new(store), Arc::new(MutableClock::new(now)));

        cache.clear_all().await.expect("clear succeeds");
    }

    #[rstest]
    #[tokio::test]
    async fn stats_surface_unavailable_storage(now: DateTime<Utc>) {
        let mut store = MockLocalStore::new();
        store
            .expect_count()
            .returning(|_| Err(LocalStoreError::not_initialized()));
        let cache = StoryCache::new(Arc::new(store), Arc::new(MutableClock::new(now)));

        let err = cache.stats().await.expect_err("stats fail");
        assert_eq!(err.code(), ErrorCode::StorageUnavailable);
    }

    #[rstest]
    fn malformed_markers_are_ignored() {
        assert!(parse_marker_time("yesterday").is_none());
    }
}
