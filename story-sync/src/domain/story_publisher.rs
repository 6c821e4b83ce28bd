//! Write and read paths that degrade to local storage when offline.
//!
//! Publishing tries the remote service first and stages the draft in the
//! pending-write queue when the host is offline or the service cannot be
//! reached. A rejection from a reachable service is returned to the caller
//! instead of being staged.

use std::sync::Arc;

use mockable::Clock;
use tracing::{info, warn};

use crate::domain::ports::{LocalStore, StoryRemote, StoryRemoteError};
use crate::domain::store_mapping::map_remote_error;
use crate::domain::{
    AuthToken, ConnectivityMonitor, Error, LocalId, PendingWriteQueue, Story, StoryCache,
    StoryDraft,
};

/// What happened to a published draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The remote service accepted the story.
    Published {
        /// Acknowledgement from the service.
        message: String,
    },
    /// The story was staged for a later drain pass.
    Staged {
        /// Queue identifier.
        local_id: LocalId,
    },
}

/// Where a story listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSource {
    /// Fresh from the remote service (and now cached).
    Remote,
    /// Served from the local cache.
    Cache,
}

/// Stories plus their provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryListing {
    /// Stories to display.
    pub stories: Vec<Story>,
    /// Where they came from.
    pub source: ListingSource,
}

/// Offline-aware entry point for creating and listing stories.
#[derive(Clone)]
pub struct StoryPublisher {
    remote: Arc<dyn StoryRemote>,
    queue: PendingWriteQueue,
    cache: StoryCache,
    connectivity: Arc<ConnectivityMonitor>,
}

impl StoryPublisher {
    /// Wire the publisher to the shared store and remote.
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn StoryRemote>,
        connectivity: Arc<ConnectivityMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            remote,
            queue: PendingWriteQueue::new(Arc::clone(&store), Arc::clone(&clock)),
            cache: StoryCache::new(store, clock),
            connectivity,
        }
    }

    /// Submit `draft`, staging it when the service is unreachable.
    pub async fn publish(
        &self,
        token: &AuthToken,
        draft: &StoryDraft,
    ) -> Result<PublishOutcome, Error> {
        if !self.connectivity.is_online() {
            return self.stage(draft).await;
        }

        match self.remote.submit_story(token, draft).await {
            Ok(receipt) => {
                info!("story published");
                Ok(PublishOutcome::Published {
                    message: receipt.message,
                })
            }
            Err(StoryRemoteError::Network { message }) => {
                warn!(%message, "story service unreachable; staging story");
                self.stage(draft).await
            }
            Err(err) => Err(map_remote_error(err)),
        }
    }

    /// List stories, falling back to the cache when the service is
    /// unreachable.
    pub async fn list_stories(
        &self,
        token: &AuthToken,
        with_location: bool,
    ) -> Result<StoryListing, Error> {
        if !self.connectivity.is_online() {
            return self.cached(with_location).await;
        }

        match self.remote.fetch_stories(token, with_location).await {
            Ok(remote) => {
                let stories = self.cache.save_stories(remote).await?;
                Ok(StoryListing {
                    stories,
                    source: ListingSource::Remote,
                })
            }
            Err(StoryRemoteError::Network { message }) => {
                warn!(%message, "story service unreachable; serving cached stories");
                self.cached(with_location).await
            }
            Err(err) => Err(map_remote_error(err)),
        }
    }

    async fn stage(&self, draft: &StoryDraft) -> Result<PublishOutcome, Error> {
        let local_id = self.queue.enqueue(draft).await?;
        Ok(PublishOutcome::Staged { local_id })
    }

    async fn cached(&self, with_location: bool) -> Result<StoryListing, Error> {
        let mut stories = self.cache.cached_stories().await?;
        if with_location {
            stories.retain(|story| story.location.is_some());
        }
        Ok(StoryListing {
            stories,
            source: ListingSource::Cache,
        })
    }
}
