//! Test utilities for the story-sync crate.
//!
//! Shared doubles for unit tests (in `src/`) and integration tests (in
//! `tests/`). Compiled for `cfg(test)` and the `test-support` feature.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore};

use crate::domain::ports::{RemoteStory, StoryRemote, StoryRemoteError, SubmitReceipt};
use crate::domain::{AuthToken, StoryDraft, Subscription, SyncEventKind, SyncStatusBus, SyncStatusEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("test double mutex poisoned"),
    }
}

/// Clock whose time only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *lock(&self.0) += delta;
    }

    pub fn advance_seconds(&self, seconds: i64) {
        *lock(&self.0) += TimeDelta::seconds(seconds);
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// Collects every event published on a [`SyncStatusBus`].
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<SyncStatusEvent>>>,
    _subscription: Subscription,
}

impl RecordingObserver {
    pub fn attach(bus: &SyncStatusBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = bus.subscribe(move |event: &SyncStatusEvent| {
            lock(&sink).push(event.clone());
        });
        Self {
            events,
            _subscription: subscription,
        }
    }

    pub fn events(&self) -> Vec<SyncStatusEvent> {
        lock(&self.events).clone()
    }

    pub fn kinds(&self) -> Vec<SyncEventKind> {
        lock(&self.events).iter().map(|event| event.kind).collect()
    }

    pub fn count_of(&self, kind: SyncEventKind) -> usize {
        lock(&self.events)
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }
}

/// `StoryRemote` that replays scripted submission results.
///
/// Unscripted submissions are accepted. With a gate installed, each
/// submission waits for a permit released by [`Self::release`].
#[derive(Default)]
pub struct ScriptedStoryRemote {
    submissions: Mutex<VecDeque<Result<SubmitReceipt, StoryRemoteError>>>,
    listing: Mutex<Option<Result<Vec<RemoteStory>, StoryRemoteError>>>,
    submitted: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
    entered: Notify,
}

impl ScriptedStoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every submission until [`Self::release`] lets it through.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn accept(self) -> Self {
        self.push(Ok(SubmitReceipt {
            message: "Story created successfully".to_owned(),
        }))
    }

    pub fn fail_network(self) -> Self {
        self.push(Err(StoryRemoteError::network("connection reset by peer")))
    }

    pub fn reject(self, status: u16, message: &str) -> Self {
        self.push(Err(StoryRemoteError::rejected(status, message)))
    }

    pub fn with_listing(self, listing: Result<Vec<RemoteStory>, StoryRemoteError>) -> Self {
        *lock(&self.listing) = Some(listing);
        self
    }

    fn push(self, result: Result<SubmitReceipt, StoryRemoteError>) -> Self {
        lock(&self.submissions).push_back(result);
        self
    }

    /// Let `count` gated submissions proceed.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Resolve once a submission has reached the remote.
    pub async fn submission_started(&self) {
        self.entered.notified().await;
    }

    /// Descriptions of every submission received, in order.
    pub fn submitted(&self) -> Vec<String> {
        lock(&self.submitted).clone()
    }
}

#[async_trait]
impl StoryRemote for ScriptedStoryRemote {
    async fn submit_story(
        &self,
        _token: &AuthToken,
        draft: &StoryDraft,
    ) -> Result<SubmitReceipt, StoryRemoteError> {
        lock(&self.submitted).push(draft.description().to_owned());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(StoryRemoteError::network("gate closed")),
            }
        }
        lock(&self.submissions).pop_front().unwrap_or_else(|| {
            Ok(SubmitReceipt {
                message: "Story created successfully".to_owned(),
            })
        })
    }

    async fn fetch_stories(
        &self,
        _token: &AuthToken,
        _with_location: bool,
    ) -> Result<Vec<RemoteStory>, StoryRemoteError> {
        lock(&self.listing).clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Answer exactly one HTTP request with `status_line` and a JSON `body`.
///
/// Returns the base URL of the listener.
pub async fn serve_once(status_line: &'static str, body: &'static str) -> Url {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(error) => panic!("bind test listener: {error}"),
    };
    let address = match listener.local_addr() {
        Ok(address) => address,
        Err(error) => panic!("test listener address: {error}"),
    };
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buffer = [0_u8; 8192];
        // Drain the request until the client goes quiet.
        while let Ok(Ok(read)) =
            tokio::time::timeout(Duration::from_millis(200), socket.read(&mut buffer)).await
        {
            if read == 0 {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        if socket.write_all(response.as_bytes()).await.is_ok() {
            socket.shutdown().await.ok();
        }
    });
    match Url::parse(&format!("http://{address}/")) {
        Ok(url) => url,
        Err(error) => panic!("test listener url: {error}"),
    }
}

/// Base URL of a local port with nothing listening on it.
pub async fn closed_local_url() -> Url {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(error) => panic!("bind probe listener: {error}"),
    };
    let address = match listener.local_addr() {
        Ok(address) => address,
        Err(error) => panic!("probe listener address: {error}"),
    };
    drop(listener);
    match Url::parse(&format!("http://{address}/")) {
        Ok(url) => url,
        Err(error) => panic!("probe url: {error}"),
    }
}
