//! End-to-end drain behaviour with a real store and scripted remote.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use mockable::Clock as _;
use rstest::{fixture, rstest};
use serde_json::json;
use story_sync::domain::ports::{Collection, LocalStore};
use story_sync::domain::{
    AuthToken, ConnectivityMonitor, PendingStatus, PendingWriteQueue, RetryBackoff, SkipReason,
    StoryDraft, SyncEngine, SyncEnginePorts, SyncEventKind, SyncOutcome, SyncRun,
};
use story_sync::outbound::memory::InMemoryLocalStore;
use story_sync::test_support::{MutableClock, RecordingObserver, ScriptedStoryRemote};
use tokio::time::timeout;

struct Rig {
    store: Arc<dyn LocalStore>,
    clock: Arc<MutableClock>,
    remote: Arc<ScriptedStoryRemote>,
    connectivity: Arc<ConnectivityMonitor>,
    queue: PendingWriteQueue,
    engine: Arc<SyncEngine>,
}

#[fixture]
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 12, 7, 15, 0)
        .single()
        .expect("valid time")
}

fn token() -> AuthToken {
    AuthToken::new("bearer-abc")
}

async fn rig(
    start: DateTime<Utc>,
    remote: ScriptedStoryRemote,
    online: bool,
    backoff: Option<RetryBackoff>,
) -> Rig {
    let store: Arc<dyn LocalStore> = Arc::new(InMemoryLocalStore::new());
    store.initialize().await.expect("store opens");
    let clock = Arc::new(MutableClock::new(start));
    let remote = Arc::new(remote);
    let connectivity = Arc::new(ConnectivityMonitor::new(online));
    let engine = SyncEngine::new(SyncEnginePorts {
        store: Arc::clone(&store),
        remote: remote.clone(),
        connectivity: Arc::clone(&connectivity),
        clock: clock.clone(),
    });
    let engine = match backoff {
        Some(backoff) => engine.with_backoff(backoff),
        None => engine,
    };
    Rig {
        queue: PendingWriteQueue::new(Arc::clone(&store), clock.clone()),
        store,
        clock,
        remote,
        connectivity,
        engine: Arc::new(engine),
    }
}

impl Rig {
    async fn stage(&self, descriptions: &[&str]) {
        for description in descriptions {
            let draft = StoryDraft::new(*description, None, None).expect("valid draft");
            self.queue.enqueue(&draft).await.expect("enqueue");
            self.clock.advance_seconds(1);
        }
    }

    async fn remaining(&self) -> Vec<(String, PendingStatus, u32)> {
        self.queue
            .list_pending()
            .await
            .expect("list")
            .into_iter()
            .map(|item| (item.description, item.status, item.attempts))
            .collect()
    }
}

#[rstest]
#[tokio::test]
async fn partial_failure_keeps_only_the_failed_item(start: DateTime<Utc>) {
    let remote = ScriptedStoryRemote::new()
        .accept()
        .fail_network()
        .accept();
    let rig = rig(start, remote, true, None).await;
    rig.stage(&["alpha", "beta", "gamma"]).await;
    let observer = RecordingObserver::attach(rig.engine.events());

    let run = rig.engine.sync_pending(&token()).await.expect("sync runs");

    assert_eq!(
        run,
        SyncRun::Completed(SyncOutcome {
            synced_count: 2,
            failed_count: 1,
            deferred_count: 0,
        })
    );
    assert_eq!(rig.remote.submitted(), vec!["alpha", "beta", "gamma"]);
    assert_eq!(
        rig.remaining().await,
        vec![("beta".to_owned(), PendingStatus::Failed, 1)]
    );
    assert_eq!(
        observer.kinds(),
        vec![
            SyncEventKind::Start,
            SyncEventKind::Progress,
            SyncEventKind::Progress,
            SyncEventKind::Progress,
            SyncEventKind::Success,
            SyncEventKind::Warning,
        ]
    );
    let status = rig.engine.status().await.expect("status");
    assert_eq!(status.last_sync, Some(rig.clock.utc()));
}

#[rstest]
#[tokio::test]
async fn rejected_items_stay_queued_for_retry(start: DateTime<Utc>) {
    let remote = ScriptedStoryRemote::new().reject(400, "photo too large");
    let rig = rig(start, remote, true, None).await;
    rig.stage(&["oversized"]).await;

    let first = rig.engine.sync_pending(&token()).await.expect("sync runs");
    let second = rig.engine.sync_pending(&token()).await.expect("sync runs");

    assert!(matches!(first, SyncRun::Completed(o) if o.failed_count == 1));
    assert!(matches!(second, SyncRun::Completed(o) if o.synced_count == 1));
    assert!(rig.remaining().await.is_empty());
}

#[rstest]
#[tokio::test]
async fn concurrent_requests_run_at_most_one_pass(start: DateTime<Utc>) {
    let rig = rig(start, ScriptedStoryRemote::gated(), true, None).await;
    rig.stage(&["only"]).await;
    let observer = RecordingObserver::attach(rig.engine.events());

    let engine = Arc::clone(&rig.engine);
    let first = tokio::spawn(async move { engine.sync_pending(&token()).await });
    timeout(Duration::from_secs(5), rig.remote.submission_started())
        .await
        .expect("first pass reaches the remote");
    assert!(rig.engine.is_syncing());

    let second = rig.engine.sync_pending(&token()).await.expect("sync returns");
    assert_eq!(second, SyncRun::Skipped(SkipReason::AlreadySyncing));

    rig.remote.release(1);
    let first = timeout(Duration::from_secs(5), first)
        .await
        .expect("first pass finishes")
        .expect("task joins")
        .expect("sync runs");

    assert!(matches!(first, SyncRun::Completed(o) if o.synced_count == 1));
    assert_eq!(observer.count_of(SyncEventKind::Start), 1);
    assert_eq!(rig.remote.submitted().len(), 1);
    assert!(!rig.engine.is_syncing());
}

#[rstest]
#[tokio::test]
async fn regaining_connectivity_drains_the_queue(start: DateTime<Utc>) {
    let rig = rig(start, ScriptedStoryRemote::new(), false, None).await;
    rig.stage(&["queued one", "queued two"]).await;
    let observer = RecordingObserver::attach(rig.engine.events());
    let auto_sync = rig.engine.spawn_auto_sync(token());

    assert_eq!(
        rig.engine.sync_pending(&token()).await.expect("sync returns"),
        SyncRun::Skipped(SkipReason::Offline)
    );
    rig.connectivity.set_online(true);

    timeout(Duration::from_secs(5), async {
        while observer.count_of(SyncEventKind::Success) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("auto sync completes");
    auto_sync.stop().await;

    let events = observer.events();
    assert_eq!(events.first().map(|event| event.kind), Some(SyncEventKind::Info));
    let success = events
        .iter()
        .find(|event| event.kind == SyncEventKind::Success)
        .expect("success event");
    assert!(success.message.contains('2'));
    assert!(rig.remaining().await.is_empty());
}

#[rstest]
#[tokio::test]
async fn backoff_defers_recently_failed_items(start: DateTime<Utc>) {
    let backoff = RetryBackoff {
        initial: Duration::from_secs(30),
        max: Duration::from_secs(300),
    };
    let remote = ScriptedStoryRemote::new().fail_network();
    let rig = rig(start, remote, true, Some(backoff)).await;
    rig.stage(&["flaky"]).await;

    rig.engine.sync_pending(&token()).await.expect("first pass");
    let deferred = rig.engine.sync_pending(&token()).await.expect("second pass");
    rig.clock.advance_seconds(31);
    let retried = rig.engine.sync_pending(&token()).await.expect("third pass");

    assert!(matches!(deferred, SyncRun::Completed(o) if o.deferred_count == 1 && o.synced_count == 0));
    assert!(matches!(retried, SyncRun::Completed(o) if o.synced_count == 1));
    assert_eq!(rig.remote.submitted(), vec!["flaky", "flaky"]);
}

#[rstest]
#[tokio::test]
async fn malformed_records_do_not_block_healthy_ones(start: DateTime<Utc>) {
    let rig = rig(start, ScriptedStoryRemote::new(), true, None).await;
    rig.stage(&["good"]).await;
    rig.store
        .put(Collection::PendingStories, None, json!({ "description": 5 }))
        .await
        .expect("raw put");
    rig.stage(&["also good"]).await;
    let observer = RecordingObserver::attach(rig.engine.events());

    let run = rig.engine.sync_pending(&token()).await.expect("sync runs");

    assert_eq!(
        run,
        SyncRun::Completed(SyncOutcome {
            synced_count: 2,
            failed_count: 1,
            deferred_count: 0,
        })
    );
    assert_eq!(rig.remote.submitted(), vec!["good", "also good"]);
    assert_eq!(observer.count_of(SyncEventKind::Error), 0);
    assert_eq!(observer.count_of(SyncEventKind::Warning), 1);
    assert_eq!(rig.queue.count().await.expect("count"), 1, "malformed record stays staged");
}

#[rstest]
#[tokio::test]
async fn stopping_auto_sync_lets_a_running_pass_finish(start: DateTime<Utc>) {
    let rig = rig(start, ScriptedStoryRemote::gated(), false, None).await;
    rig.stage(&["in flight"]).await;
    let auto_sync = rig.engine.spawn_auto_sync(token());

    rig.connectivity.set_online(true);
    timeout(Duration::from_secs(5), rig.remote.submission_started())
        .await
        .expect("pass reaches the service");

    let stopping = tokio::spawn(auto_sync.stop());
    tokio::task::yield_now().await;
    assert!(!stopping.is_finished(), "stop waits for the running pass");
    rig.remote.release(1);
    timeout(Duration::from_secs(5), stopping)
        .await
        .expect("stop returns once the pass ends")
        .expect("stop task joins");

    assert_eq!(rig.remote.submitted(), vec!["in flight"]);
    assert!(rig.remaining().await.is_empty());
    assert!(!rig.engine.is_syncing());
    let status = rig.engine.status().await.expect("status");
    assert_eq!(status.last_sync, Some(rig.clock.utc()));
}
