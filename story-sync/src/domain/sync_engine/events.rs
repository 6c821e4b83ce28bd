//! Sync status notifications.
//!
//! Handlers are invoked synchronously for every event, in registration
//! order. A handler stays registered until its [`Subscription`] is
//! explicitly unsubscribed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;

/// Lifecycle moment an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventKind {
    /// A drain pass with at least one item began.
    Start,
    /// One item is about to be submitted.
    Progress,
    /// At least one item was confirmed.
    Success,
    /// At least one item failed, or connectivity was lost.
    Warning,
    /// The pass aborted before processing items.
    Error,
    /// Connectivity was regained.
    Info,
}

impl SyncEventKind {
    /// Wire name, matching the serialised form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for SyncEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral notification delivered to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatusEvent {
    /// Event category.
    #[serde(rename = "type")]
    pub kind: SyncEventKind,
    /// Human-readable summary.
    pub message: String,
}

impl SyncStatusEvent {
    /// Build an event.
    pub fn new(kind: SyncEventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

type Handler = Arc<dyn Fn(&SyncStatusEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler)>>,
}

impl Registry {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Handler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publish/subscribe hub for [`SyncStatusEvent`]s.
#[derive(Clone, Default)]
pub struct SyncStatusBus {
    registry: Arc<Registry>,
}

impl SyncStatusBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` and return the handle that detaches it.
    ///
    /// # Examples
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use story_sync::domain::{SyncEventKind, SyncStatusBus, SyncStatusEvent};
    ///
    /// let bus = SyncStatusBus::new();
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&seen);
    /// let subscription = bus.subscribe(move |event: &SyncStatusEvent| {
    ///     sink.lock().expect("sink").push(event.kind);
    /// });
    ///
    /// bus.emit(SyncStatusEvent::new(SyncEventKind::Start, "go"));
    /// subscription.unsubscribe();
    /// bus.emit(SyncStatusEvent::new(SyncEventKind::Success, "done"));
    ///
    /// assert_eq!(*seen.lock().expect("sink"), vec![SyncEventKind::Start]);
    /// ```
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SyncStatusEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().push((id, Arc::new(handler)));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Deliver `event` to every registered handler.
    pub fn emit(&self, event: SyncStatusEvent) {
        // Snapshot so handlers may subscribe or unsubscribe re-entrantly.
        let handlers: Vec<Handler> = self
            .registry
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        tracing::debug!(kind = ?event.kind, message = %event.message, "sync status event");
        for handler in handlers {
            handler(&event);
        }
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }
}

impl std::fmt::Debug for SyncStatusBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStatusBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by [`SyncStatusBus::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
}

impl Subscription {
    /// Detach the handler. Later events are not delivered to it.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn handlers_run_in_registration_order() {
        let bus = SyncStatusBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut subscriptions = Vec::new();
        for label in ["first", "second", "third"] {
            let sink = Arc::clone(&order);
            subscriptions.push(bus.subscribe(move |_| {
                sink.lock().expect("order lock").push(label);
            }));
        }

        bus.emit(SyncStatusEvent::new(SyncEventKind::Progress, "1/1"));

        assert_eq!(
            *order.lock().expect("order lock"),
            vec!["first", "second", "third"]
        );
        assert_eq!(subscriptions.len(), 3);
    }

    #[rstest]
    fn unsubscribing_detaches_only_that_handler() {
        let bus = SyncStatusBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let keep_sink = Arc::clone(&seen);
        let _keep = bus.subscribe(move |event| {
            keep_sink.lock().expect("seen lock").push(("keep", event.kind));
        });
        let drop_sink = Arc::clone(&seen);
        let detached = bus.subscribe(move |event| {
            drop_sink.lock().expect("seen lock").push(("drop", event.kind));
        });

        detached.unsubscribe();
        bus.emit(SyncStatusEvent::new(SyncEventKind::Info, "online"));

        assert_eq!(
            *seen.lock().expect("seen lock"),
            vec![("keep", SyncEventKind::Info)]
        );
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[rstest]
    fn events_serialise_with_type_field() {
        let event = SyncStatusEvent::new(SyncEventKind::Warning, "1 failed");
        let value = serde_json::to_value(&event).expect("event serialises");
        assert_eq!(value["type"], "warning");
        assert_eq!(value["message"], "1 failed");
    }
}
