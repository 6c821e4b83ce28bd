//! Periodic reachability probe feeding the connectivity monitor.
//!
//! Any HTTP response, including an error status, counts as reachable. Only
//! transport failures and timeouts count as offline.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::domain::ConnectivityMonitor;

/// Polls one URL and records the outcome on a [`ConnectivityMonitor`].
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    client: Client,
    target: Url,
    interval: Duration,
    monitor: Arc<ConnectivityMonitor>,
}

/// Running probe task.
#[derive(Debug)]
pub struct ReachabilityHandle {
    task: JoinHandle<()>,
}

impl ReachabilityHandle {
    /// Stop probing.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl ReachabilityProbe {
    /// Build a probe. `timeout` bounds each request.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        target: Url,
        interval: Duration,
        timeout: Duration,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            target,
            interval,
            monitor,
        })
    }

    /// Issue one request and report whether the target answered.
    pub async fn probe_once(&self) -> bool {
        match self.client.head(self.target.clone()).send().await {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "reachability probe answered");
                true
            }
            Err(error) => {
                debug!(%error, "reachability probe failed");
                false
            }
        }
    }

    /// Probe once and record the result.
    pub async fn refresh(&self) -> bool {
        let online = self.probe_once().await;
        self.monitor.set_online(online);
        online
    }

    /// Probe on a fixed interval until the handle is stopped.
    pub fn spawn(self) -> ReachabilityHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(100)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.refresh().await;
            }
        });
        ReachabilityHandle { task }
    }
}
