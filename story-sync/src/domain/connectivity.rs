//! Host connectivity state with edge-triggered notifications.

use tokio::sync::watch;
use tracing::info;

/// An online/offline transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityChange {
    /// The host regained connectivity.
    BecameOnline,
    /// The host lost connectivity.
    BecameOffline,
}

impl ConnectivityChange {
    const fn from_state(online: bool) -> Self {
        if online {
            Self::BecameOnline
        } else {
            Self::BecameOffline
        }
    }
}

/// Shared "is online" flag fed by the host environment.
///
/// Setting the same state twice does not notify subscribers.
///
/// # Examples
/// ```
/// use story_sync::domain::{ConnectivityChange, ConnectivityMonitor};
///
/// let monitor = ConnectivityMonitor::new(false);
/// assert_eq!(monitor.set_online(true), Some(ConnectivityChange::BecameOnline));
/// assert_eq!(monitor.set_online(true), None);
/// assert!(monitor.is_online());
/// ```
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Build a monitor with the given initial state.
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self { state }
    }

    /// Current state.
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record the host's connectivity. Returns the edge, if this was one.
    pub fn set_online(&self, online: bool) -> Option<ConnectivityChange> {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        changed.then(|| {
            info!(online, "connectivity changed");
            ConnectivityChange::from_state(online)
        })
    }

    /// Subscribe to future transitions.
    pub fn subscribe(&self) -> ConnectivityEvents {
        let mut receiver = self.state.subscribe();
        let last = *receiver.borrow_and_update();
        ConnectivityEvents { receiver, last }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Stream of connectivity edges for one subscriber.
#[derive(Debug)]
pub struct ConnectivityEvents {
    receiver: watch::Receiver<bool>,
    last: bool,
}

impl ConnectivityEvents {
    /// Wait for the next transition.
    ///
    /// Rapid toggles that end where they started are coalesced away. Returns
    /// `None` once the monitor is dropped.
    pub async fn next(&mut self) -> Option<ConnectivityChange> {
        loop {
            self.receiver.changed().await.ok()?;
            let online = *self.receiver.borrow_and_update();
            if online != self.last {
                self.last = online;
                return Some(ConnectivityChange::from_state(online));
            }
        }
    }
}
