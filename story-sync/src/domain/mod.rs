//! Domain primitives and services for offline-first story synchronisation.
//!
//! Purpose: define the records the local store persists, the pending-write
//! queue and its retry bookkeeping, and the engine that drains the queue
//! against the remote service. Infrastructure lives behind the ports in
//! [`ports`].
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Story, StoryDraft, PendingStory, FavoriteStory: persisted records.
//! - PendingWriteQueue, StoryCache, FavoritesService, StoryPublisher:
//!   services over the local store.
//! - SyncEngine: mutual-exclusion drain of the pending queue with status
//!   events.

pub mod connectivity;
pub mod error;
pub mod favorite;
pub mod favorites_service;
pub mod pending_queue;
pub mod pending_story;
pub mod ports;
pub(crate) mod store_mapping;
pub mod story;
pub mod story_cache;
pub mod story_publisher;
pub mod sync_engine;

pub use self::connectivity::{ConnectivityChange, ConnectivityEvents, ConnectivityMonitor};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::favorite::{FavoriteAdded, FavoriteStory};
pub use self::favorites_service::FavoritesService;
pub use self::pending_queue::{PendingEntry, PendingWriteQueue};
pub(crate) use self::pending_story::PendingStoryDocument;
pub use self::pending_story::{LocalId, PendingStatus, PendingStory, PhotoDecodeError, StagedPhoto};
pub use self::story::{
    AuthToken, GeoPoint, GeoPointError, PhotoAttachment, Story, StoryDraft, StoryDraftError,
    SyncStatus,
};
pub use self::story_cache::{LAST_SYNC_MARKER, StorageStats, StoryCache};
pub use self::story_publisher::{ListingSource, PublishOutcome, StoryListing, StoryPublisher};
pub use self::sync_engine::{
    AutoSyncHandle, RetryBackoff, SkipReason, Subscription, SyncEngine, SyncEnginePorts,
    SyncEventKind, SyncOutcome, SyncRun, SyncStatusBus, SyncStatusEvent, SyncStatusSnapshot,
};
