//! Composition root wiring adapters into the domain services.
//!
//! Every service shares one `LocalStore` instance so the write path and the
//! drain pass observe the same queue.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::info;

use crate::config::{SettingsError, SyncSettings};
use crate::domain::ports::{FixtureStoryRemote, LocalStore, StoryRemote};
use crate::domain::store_mapping::map_store_error;
use crate::domain::{
    AuthToken, AutoSyncHandle, ConnectivityMonitor, Error, FavoritesService, PendingWriteQueue,
    RetryBackoff, StoryCache, StoryPublisher, SyncEngine, SyncEnginePorts,
};
use crate::outbound::http::{
    ReachabilityHandle, ReachabilityProbe, StoryHttpClient, StoryHttpClientError,
};
use crate::outbound::persistence::SqliteLocalStore;

/// Raised while assembling services from settings.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// A setting could not be interpreted.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// The story service client could not be built.
    #[error(transparent)]
    HttpClient(#[from] StoryHttpClientError),
    /// The reachability probe could not be built.
    #[error("failed to build reachability probe: {0}")]
    Probe(#[from] reqwest::Error),
}

/// Adapters chosen for one client instance.
pub struct ClientPorts {
    /// Shared local store.
    pub store: Arc<dyn LocalStore>,
    /// Remote story service.
    pub remote: Arc<dyn StoryRemote>,
    /// Host connectivity.
    pub connectivity: Arc<ConnectivityMonitor>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Optional retry spacing for failed items.
    pub backoff: Option<RetryBackoff>,
}

/// Background tasks started by [`ClientServices::spawn_background`].
pub struct BackgroundTasks {
    auto_sync: AutoSyncHandle,
    probe: Option<ReachabilityHandle>,
}

impl BackgroundTasks {
    /// Stop probing, then wait for auto sync to wind down.
    pub async fn stop(self) {
        if let Some(probe) = self.probe {
            probe.stop();
        }
        self.auto_sync.stop().await;
    }
}

/// Fully wired client services.
pub struct ClientServices {
    store: Arc<dyn LocalStore>,
    connectivity: Arc<ConnectivityMonitor>,
    /// Offline-aware write and list paths.
    pub publisher: StoryPublisher,
    /// Confirmed-story cache.
    pub cache: StoryCache,
    /// Favourites collection.
    pub favorites: FavoritesService,
    /// Pending-write queue.
    pub queue: PendingWriteQueue,
    /// Drain engine.
    pub engine: Arc<SyncEngine>,
    /// Reachability probe, when a remote service is configured.
    pub probe: Option<ReachabilityProbe>,
}

impl ClientServices {
    /// Wire services over explicit adapters.
    pub fn assemble(ports: ClientPorts) -> Self {
        let ClientPorts {
            store,
            remote,
            connectivity,
            clock,
            backoff,
        } = ports;
        let engine = SyncEngine::new(SyncEnginePorts {
            store: Arc::clone(&store),
            remote: Arc::clone(&remote),
            connectivity: Arc::clone(&connectivity),
            clock: Arc::clone(&clock),
        });
        let engine = match backoff {
            Some(backoff) => engine.with_backoff(backoff),
            None => engine,
        };
        Self {
            publisher: StoryPublisher::new(
                Arc::clone(&store),
                remote,
                Arc::clone(&connectivity),
                Arc::clone(&clock),
            ),
            cache: StoryCache::new(Arc::clone(&store), Arc::clone(&clock)),
            favorites: FavoritesService::new(Arc::clone(&store), Arc::clone(&clock)),
            queue: PendingWriteQueue::new(Arc::clone(&store), clock),
            engine: Arc::new(engine),
            probe: None,
            store,
            connectivity,
        }
    }

    /// Wire the SQLite store and, when configured, the HTTP remote.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] when a setting is unusable or an HTTP
    /// client cannot be built.
    pub fn from_settings(settings: &SyncSettings) -> Result<Self, BootstrapError> {
        let database_path = settings.database_path();
        let store: Arc<dyn LocalStore> = Arc::new(SqliteLocalStore::new(
            database_path.to_string_lossy().into_owned(),
        ));
        let connectivity = Arc::new(ConnectivityMonitor::default());

        let (remote, probe): (Arc<dyn StoryRemote>, Option<ReachabilityProbe>) =
            match settings.api_base_url()? {
                Some(base_url) => {
                    let timeout = settings.request_timeout();
                    let probe = ReachabilityProbe::new(
                        base_url.clone(),
                        settings.probe_interval(),
                        timeout,
                        Arc::clone(&connectivity),
                    )?;
                    let client = StoryHttpClient::new(base_url, timeout)?;
                    info!(stories_url = %client.stories_url(), "using remote story service");
                    (Arc::new(client), Some(probe))
                }
                None => {
                    info!("no api_base_url configured; using fixture story remote");
                    (Arc::new(FixtureStoryRemote), None)
                }
            };

        let mut services = Self::assemble(ClientPorts {
            store,
            remote,
            connectivity,
            clock: Arc::new(DefaultClock),
            backoff: settings.retry_backoff(),
        });
        services.probe = probe;
        Ok(services)
    }

    /// Open the local store.
    pub async fn start(&self) -> Result<(), Error> {
        self.store.initialize().await.map_err(map_store_error)
    }

    /// Release the local store.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.store.shutdown().await.map_err(map_store_error)
    }

    /// Probe the remote once, when one is configured, and record the result.
    pub async fn refresh_connectivity(&self) -> bool {
        match &self.probe {
            Some(probe) => probe.refresh().await,
            None => self.connectivity.is_online(),
        }
    }

    /// Start auto sync and, when configured, periodic probing.
    pub fn spawn_background(&self, token: AuthToken) -> BackgroundTasks {
        BackgroundTasks {
            auto_sync: self.engine.spawn_auto_sync(token),
            probe: self.probe.clone().map(ReachabilityProbe::spawn),
        }
    }

    /// Shared connectivity monitor.
    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    /// Shared local store.
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }
}
