//! Connectivity-triggered synchronisation.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{SyncEngine, SyncEventKind, SyncRun};
use crate::domain::{AuthToken, ConnectivityChange};

/// Background task reacting to connectivity edges.
#[derive(Debug)]
pub struct AutoSyncHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AutoSyncHandle {
    /// Stop reacting to connectivity changes.
    ///
    /// A drain pass already under way runs to completion before this
    /// returns; only the wait for the next connectivity edge is cancelled.
    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "auto sync task ended abnormally");
        }
    }

    /// Whether the task has ended, e.g. because the monitor was dropped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl SyncEngine {
    /// Spawn a task that syncs whenever connectivity returns.
    ///
    /// Regaining connectivity emits an `info` event and requests a drain
    /// through the usual mutual-exclusion gate. Losing it emits a `warning`.
    /// Must be called inside a Tokio runtime.
    pub fn spawn_auto_sync(self: &Arc<Self>, token: AuthToken) -> AutoSyncHandle {
        let engine = Arc::clone(self);
        let mut changes = engine.connectivity.subscribe();
        let (shutdown, mut stopping) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                let change = tokio::select! {
                    biased;
                    _ = stopping.changed() => {
                        info!("auto sync stopped");
                        return;
                    }
                    change = changes.next() => change,
                };
                let Some(change) = change else {
                    info!("connectivity monitor closed; auto sync stopped");
                    return;
                };
                engine.handle_connectivity_change(change, &token).await;
            }
        });
        AutoSyncHandle { shutdown, task }
    }

    /// React to one connectivity edge.
    pub async fn handle_connectivity_change(&self, change: ConnectivityChange, token: &AuthToken) {
        match change {
            ConnectivityChange::BecameOnline => {
                info!("back online, starting sync");
                self.emit(
                    SyncEventKind::Info,
                    "Back online, syncing pending stories...",
                );
                match self.sync_pending(token).await {
                    Ok(SyncRun::Completed(outcome)) => {
                        info!(synced = outcome.synced_count, "auto sync finished");
                    }
                    Ok(SyncRun::Skipped(reason)) => info!(?reason, "auto sync skipped"),
                    Err(err) => warn!(error = %err, "auto sync failed"),
                }
            }
            ConnectivityChange::BecameOffline => {
                info!("gone offline");
                self.emit(
                    SyncEventKind::Warning,
                    "You are offline. New stories will be saved locally.",
                );
            }
        }
    }
}
