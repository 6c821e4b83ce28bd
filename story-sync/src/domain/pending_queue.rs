//! Pending-write queue layered on the local store's pending collection.
//!
//! The queue is unbounded. Items leave it only through
//! [`PendingWriteQueue::confirm_and_remove`]; failed attempts update the
//! record in place and keep it eligible for the next drain.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::ports::{Collection, LocalStore, RecordKey, StoredDocument};
use crate::domain::store_mapping::{decode_body, encode_body, map_store_error};
use crate::domain::{
    Error, LocalId, PendingStatus, PendingStory, PendingStoryDocument, StoryDraft,
};

/// One staged record as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEntry {
    /// A record that decodes to a staged story.
    Ready(PendingStory),
    /// A record whose body no longer decodes. It stays staged.
    Malformed {
        /// Store key of the record.
        local_id: LocalId,
        /// Decode failure.
        reason: Error,
    },
}

/// Staging area for stories the remote service has not yet accepted.
#[derive(Clone)]
pub struct PendingWriteQueue {
    store: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
}

impl PendingWriteQueue {
    /// Build a queue over `store`, stamping times from `clock`.
    pub fn new(store: Arc<dyn LocalStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Stage a draft with status `pending` and zero attempts.
    ///
    /// Returns the store-assigned local id.
    pub async fn enqueue(&self, draft: &StoryDraft) -> Result<LocalId, Error> {
        let document = PendingStoryDocument::staged(draft, self.clock.utc());
        let body = encode_body(&document)?;
        let key = self
            .store
            .put(Collection::PendingStories, None, body)
            .await
            .map_err(map_store_error)?;
        let local_id = local_id_from_key(&key)?;
        info!(local_id = local_id.get(), "story staged for later sync");
        Ok(local_id)
    }

    /// Every staged story, `pending` and `failed` alike, oldest first.
    ///
    /// Records that no longer decode are logged and left out; they remain
    /// in the store and are still reported by [`Self::count`].
    pub async fn list_pending(&self) -> Result<Vec<PendingStory>, Error> {
        let entries = self.list_entries().await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                PendingEntry::Ready(story) => Some(story),
                PendingEntry::Malformed { local_id, reason } => {
                    warn!(local_id = local_id.get(), error = %reason, "skipping malformed pending story");
                    None
                }
            })
            .collect())
    }

    /// Every staged record, oldest first, decoded one at a time.
    ///
    /// Fails only when the store itself cannot be read.
    pub async fn list_entries(&self) -> Result<Vec<PendingEntry>, Error> {
        let documents = self
            .store
            .get_all(Collection::PendingStories)
            .await
            .map_err(map_store_error)?;
        documents.iter().map(entry_from_document).collect()
    }

    /// Look up a single staged story.
    pub async fn get(&self, local_id: LocalId) -> Result<Option<PendingStory>, Error> {
        let document = self
            .store
            .get_by_key(Collection::PendingStories, &key_for(local_id))
            .await
            .map_err(map_store_error)?;
        document.as_ref().map(pending_from_document).transpose()
    }

    /// Record a failed submission attempt.
    ///
    /// Increments the attempt counter, sets status `failed`, and stamps the
    /// attempt time. The record stays in the queue. Fails with `NotFound`
    /// when the id is no longer staged.
    pub async fn mark_attempt_failed(&self, local_id: LocalId) -> Result<PendingStory, Error> {
        let key = key_for(local_id);
        let Some(stored) = self
            .store
            .get_by_key(Collection::PendingStories, &key)
            .await
            .map_err(map_store_error)?
        else {
            return Err(Error::not_found(format!(
                "pending story {local_id} is not staged"
            )));
        };

        let mut document: PendingStoryDocument = decode_body(&stored)?;
        document.status = PendingStatus::Failed;
        document.attempts = document.attempts.saturating_add(1);
        document.last_attempt_at = Some(self.clock.utc());

        let body = encode_body(&document)?;
        self.store
            .put(Collection::PendingStories, Some(key), body)
            .await
            .map_err(map_store_error)?;
        debug!(
            local_id = local_id.get(),
            attempts = document.attempts,
            "pending story attempt recorded as failed"
        );
        Ok(document.into_pending(local_id))
    }

    /// Remove a story the remote service accepted.
    ///
    /// Returns `false` when the id was already gone; that is not an error.
    pub async fn confirm_and_remove(&self, local_id: LocalId) -> Result<bool, Error> {
        let removed = self
            .store
            .delete(Collection::PendingStories, &key_for(local_id))
            .await
            .map_err(map_store_error)?;
        if !removed {
            debug!(local_id = local_id.get(), "pending story already removed");
        }
        Ok(removed)
    }

    /// Number of staged stories.
    pub async fn count(&self) -> Result<u64, Error> {
        self.store
            .count(Collection::PendingStories)
            .await
            .map_err(map_store_error)
    }
}

fn key_for(local_id: LocalId) -> RecordKey {
    RecordKey::Sequence(local_id.get())
}

fn local_id_from_key(key: &RecordKey) -> Result<LocalId, Error> {
    key.as_sequence()
        .map(LocalId::new)
        .ok_or_else(|| Error::internal(format!("pending story key {key} is not a sequence")))
}

fn entry_from_document(document: &StoredDocument) -> Result<PendingEntry, Error> {
    let local_id = local_id_from_key(&document.key)?;
    Ok(match decode_body::<PendingStoryDocument>(document) {
        Ok(body) => PendingEntry::Ready(body.into_pending(local_id)),
        Err(reason) => PendingEntry::Malformed { local_id, reason },
    })
}

fn pending_from_document(document: &StoredDocument) -> Result<PendingStory, Error> {
    let local_id = local_id_from_key(&document.key)?;
    let body: PendingStoryDocument = decode_body(document)?;
    Ok(body.into_pending(local_id))
}
