//! Synchronisation engine draining the pending-write queue.
//!
//! The engine has two states, idle and syncing. A drain pass starts only
//! when connectivity is available and no other pass is running; concurrent
//! requests are absorbed as [`SkipReason::AlreadySyncing`]. Items are
//! processed strictly one at a time in queue order, and one item's failure
//! never aborts the batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{LocalStore, StoryRemote};
use crate::domain::store_mapping::{map_remote_error, map_store_error};
use crate::domain::story_cache::{LAST_SYNC_MARKER, parse_marker_time};
use crate::domain::{
    AuthToken, ConnectivityMonitor, Error, ErrorCode, PendingEntry, PendingStory, PendingWriteQueue,
};

mod auto_sync;
mod events;
mod policy;

pub use auto_sync::AutoSyncHandle;
pub use events::{Subscription, SyncEventKind, SyncStatusBus, SyncStatusEvent};
pub use policy::RetryBackoff;

/// Why a sync request did not start a drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass is already running.
    AlreadySyncing,
    /// The host is offline.
    Offline,
}

/// Counts reported by a completed drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Items the remote service accepted and that were removed.
    pub synced_count: usize,
    /// Items whose submission failed; they stay queued.
    pub failed_count: usize,
    /// Items skipped because their retry backoff had not elapsed.
    pub deferred_count: usize,
}

/// Result of a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRun {
    /// No pass ran.
    Skipped(SkipReason),
    /// A pass ran to completion.
    Completed(SyncOutcome),
}

/// Point-in-time view of the engine for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatusSnapshot {
    /// Whether a pass is running.
    pub is_syncing: bool,
    /// Current connectivity.
    pub is_online: bool,
    /// When the last pass completed.
    pub last_sync: Option<DateTime<Utc>>,
}

/// Collaborators the engine drives.
#[derive(Clone)]
pub struct SyncEnginePorts {
    /// Shared local store; must be the same instance the write path uses.
    pub store: Arc<dyn LocalStore>,
    /// Remote story service.
    pub remote: Arc<dyn StoryRemote>,
    /// Host connectivity.
    pub connectivity: Arc<ConnectivityMonitor>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Drains staged stories against the remote service.
pub struct SyncEngine {
    queue: PendingWriteQueue,
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn StoryRemote>,
    connectivity: Arc<ConnectivityMonitor>,
    clock: Arc<dyn Clock>,
    events: SyncStatusBus,
    backoff: Option<RetryBackoff>,
    syncing: AtomicBool,
}

struct SyncingGuard<'a>(&'a AtomicBool);

impl<'a> SyncingGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncEngine {
    /// Build an engine with no retry backoff.
    pub fn new(ports: SyncEnginePorts) -> Self {
        let SyncEnginePorts {
            store,
            remote,
            connectivity,
            clock,
        } = ports;
        Self {
            queue: PendingWriteQueue::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
            remote,
            connectivity,
            clock,
            events: SyncStatusBus::new(),
            backoff: None,
            syncing: AtomicBool::new(false),
        }
    }

    /// Space out retries of previously failed items.
    #[must_use]
    pub fn with_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Event hub for status notifications.
    pub fn events(&self) -> &SyncStatusBus {
        &self.events
    }

    /// Register a status handler. See [`SyncStatusBus::subscribe`].
    pub fn on_sync_status_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SyncStatusEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// Whether a drain pass is running.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Engine state plus the persisted last-sync time.
    pub async fn status(&self) -> Result<SyncStatusSnapshot, Error> {
        let marker = self
            .store
            .read_marker(LAST_SYNC_MARKER)
            .await
            .map_err(map_store_error)?;
        Ok(SyncStatusSnapshot {
            is_syncing: self.is_syncing(),
            is_online: self.connectivity.is_online(),
            last_sync: marker.as_deref().and_then(parse_marker_time),
        })
    }

    /// Run one drain pass if online and idle.
    ///
    /// Only a failure to list the queue is returned as an error; per-item
    /// failures are counted in the outcome.
    pub async fn sync_pending(&self, token: &AuthToken) -> Result<SyncRun, Error> {
        if !self.connectivity.is_online() {
            debug!("sync skipped: offline");
            return Ok(SyncRun::Skipped(SkipReason::Offline));
        }
        // Claimed before the first await so concurrent callers cannot both
        // pass the check.
        let Some(guard) = SyncingGuard::claim(&self.syncing) else {
            debug!("sync skipped: already in progress");
            return Ok(SyncRun::Skipped(SkipReason::AlreadySyncing));
        };

        let pending = match self.queue.list_entries().await {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = %err, "sync aborted: pending stories unavailable");
                let message = if err.code() == ErrorCode::StorageUnavailable {
                    "Sync failed: local storage unavailable"
                } else {
                    "Sync failed: pending stories could not be read"
                };
                self.emit(SyncEventKind::Error, message);
                return Err(err);
            }
        };

        if pending.is_empty() {
            debug!("no pending stories to sync");
            return Ok(SyncRun::Completed(SyncOutcome::default()));
        }

        let outcome = self.drain(token, &pending).await;
        self.record_sync_time().await;
        drop(guard);
        self.report(outcome);
        Ok(SyncRun::Completed(outcome))
    }

    async fn drain(&self, token: &AuthToken, pending: &[PendingEntry]) -> SyncOutcome {
        let total = pending.len();
        info!(total, "syncing pending stories");
        self.emit(
            SyncEventKind::Start,
            format!("Syncing {total} pending stories..."),
        );

        let now = self.clock.utc();
        let mut outcome = SyncOutcome::default();
        for (index, entry) in pending.iter().enumerate() {
            let position = index.saturating_add(1);
            self.emit(
                SyncEventKind::Progress,
                format!("Syncing {position}/{total}..."),
            );

            let item = match entry {
                PendingEntry::Ready(item) => item,
                PendingEntry::Malformed { local_id, reason } => {
                    error!(
                        local_id = local_id.get(),
                        error = %reason,
                        "pending story is malformed; left staged"
                    );
                    outcome.failed_count = outcome.failed_count.saturating_add(1);
                    continue;
                }
            };

            if self
                .backoff
                .is_some_and(|backoff| !backoff.is_due(item, now))
            {
                debug!(local_id = item.local_id.get(), "retry backoff not elapsed");
                outcome.deferred_count = outcome.deferred_count.saturating_add(1);
                continue;
            }

            match self.submit(token, item).await {
                Ok(()) => {
                    if let Err(err) = self.queue.confirm_and_remove(item.local_id).await {
                        error!(
                            local_id = item.local_id.get(),
                            error = %err,
                            "story accepted but could not be removed from the queue"
                        );
                    }
                    info!(local_id = item.local_id.get(), "pending story synced");
                    outcome.synced_count = outcome.synced_count.saturating_add(1);
                }
                Err(err) => {
                    warn!(local_id = item.local_id.get(), error = %err, "pending story sync failed");
                    if let Err(mark_err) = self.queue.mark_attempt_failed(item.local_id).await {
                        error!(
                            local_id = item.local_id.get(),
                            error = %mark_err,
                            "failed to record sync attempt"
                        );
                    }
                    outcome.failed_count = outcome.failed_count.saturating_add(1);
                }
            }
        }
        outcome
    }

    async fn submit(&self, token: &AuthToken, item: &PendingStory) -> Result<(), Error> {
        let draft = item.to_draft()?;
        self.remote
            .submit_story(token, &draft)
            .await
            .map(|_| ())
            .map_err(map_remote_error)
    }

    async fn record_sync_time(&self) {
        let stamp = self.clock.utc().to_rfc3339();
        if let Err(err) = self.store.write_marker(LAST_SYNC_MARKER, &stamp).await {
            warn!(error = %err, "failed to persist last sync time");
        }
    }

    fn report(&self, outcome: SyncOutcome) {
        info!(
            synced = outcome.synced_count,
            failed = outcome.failed_count,
            deferred = outcome.deferred_count,
            "sync pass finished"
        );
        if outcome.synced_count > 0 {
            self.emit(
                SyncEventKind::Success,
                format!("Synced {} stories successfully", outcome.synced_count),
            );
        }
        if outcome.failed_count > 0 {
            self.emit(
                SyncEventKind::Warning,
                format!(
                    "{} stories failed to sync and will be retried",
                    outcome.failed_count
                ),
            );
        }
    }

    fn emit(&self, kind: SyncEventKind, message: impl Into<String>) {
        self.events.emit(SyncStatusEvent::new(kind, message));
    }
}
