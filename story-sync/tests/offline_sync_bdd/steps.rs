//! Step definitions for offline sync BDD tests.

use super::*;
use rstest_bdd_macros::{given, then, when};
use story_sync::domain::{PendingStatus, PublishOutcome, SkipReason, SyncEventKind};
use tokio::time::timeout;

#[given("an offline story client")]
fn an_offline_story_client(world: &OfflineSyncWorld) {
    world.setup(ScriptedStoryRemote::new(), false);
}

#[given("an online story client whose service drops the first submission")]
fn an_online_story_client_whose_service_drops_the_first_submission(world: &OfflineSyncWorld) {
    world.setup(ScriptedStoryRemote::new().fail_network(), true);
}

#[given("an online story client whose service holds submissions")]
fn an_online_story_client_whose_service_holds_submissions(world: &OfflineSyncWorld) {
    world.setup(ScriptedStoryRemote::gated(), true);
}

#[given("a staged story \"{description}\"")]
fn a_staged_story(world: &OfflineSyncWorld, description: String) {
    world.stage(&description);
}

#[when("the user posts \"{description}\"")]
fn the_user_posts(world: &OfflineSyncWorld, description: String) {
    let draft = StoryDraft::new(description, None, None).expect("valid draft");
    let services = world.services();
    let outcome = world
        .runtime()
        .0
        .block_on(services.publisher.publish(&token(), &draft))
        .expect("publish succeeds");
    assert!(
        matches!(outcome, PublishOutcome::Staged { .. }),
        "story should be staged, got {outcome:?}"
    );
}

#[when("connectivity returns")]
fn connectivity_returns(world: &OfflineSyncWorld) {
    let services = world.services();
    let connectivity = world.connectivity.get().expect("connectivity should be set");
    let observer = world.observer();
    world.runtime().0.block_on(async {
        let auto_sync = services.engine.spawn_auto_sync(token());
        connectivity.set_online(true);
        timeout(WAIT, async {
            while observer.count_of(SyncEventKind::Success) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("auto sync should finish");
        auto_sync.stop().await;
    });
}

#[when("a sync pass runs")]
fn a_sync_pass_runs(world: &OfflineSyncWorld) {
    let services = world.services();
    let run = world
        .runtime()
        .0
        .block_on(services.engine.sync_pending(&token()))
        .expect("sync pass runs");
    world.last_run.set(run);
}

#[when("a second sync is requested while the first is submitting")]
fn a_second_sync_is_requested_while_the_first_is_submitting(world: &OfflineSyncWorld) {
    let services = world.services();
    let remote = world.remote();
    let (first, second) = world.runtime().0.block_on(async {
        let engine = Arc::clone(&services.engine);
        let first = tokio::spawn(async move { engine.sync_pending(&token()).await });
        timeout(WAIT, remote.submission_started())
            .await
            .expect("first pass should reach the service");

        let second = services
            .engine
            .sync_pending(&token())
            .await
            .expect("second request returns");
        remote.release(1);
        let first = timeout(WAIT, first)
            .await
            .expect("first pass should finish")
            .expect("first pass joins")
            .expect("first pass runs");
        (first, second)
    });
    world.last_run.set(first);
    world.concurrent_run.set(second);
}

fn assert_pending_count(world: &OfflineSyncWorld, expected: u64) {
    let services = world.services();
    let actual = world
        .runtime()
        .0
        .block_on(services.queue.count())
        .expect("count pending");
    assert_eq!(actual, expected);
}

#[then("the pending count is {count}")]
fn the_pending_count_is(world: &OfflineSyncWorld, count: u64) {
    assert_pending_count(world, count);
}

#[then("the pending queue is empty")]
fn the_pending_queue_is_empty(world: &OfflineSyncWorld) {
    assert_pending_count(world, 0);
}

#[then("the story service received \"{first}\" then \"{second}\"")]
fn the_story_service_received_in_order(world: &OfflineSyncWorld, first: String, second: String) {
    assert_eq!(world.remote().submitted(), vec![first, second]);
}

#[then("a success event reports {count} synced stories")]
fn a_success_event_reports_synced_stories(world: &OfflineSyncWorld, count: usize) {
    let expected = format!("Synced {count} stories successfully");
    let events = world.observer().events();
    assert!(
        events
            .iter()
            .any(|event| event.kind == SyncEventKind::Success && event.message == expected),
        "missing `{expected}` in {events:?}"
    );
}

#[then("the sync pass reports {synced} synced and {failed} failed")]
fn the_sync_pass_reports(world: &OfflineSyncWorld, synced: usize, failed: usize) {
    let run = world.last_run.get().expect("a sync pass should have run");
    let SyncRun::Completed(outcome) = run else {
        panic!("sync pass should complete, got {run:?}");
    };
    assert_eq!(outcome.synced_count, synced);
    assert_eq!(outcome.failed_count, failed);
}

#[then("the staged story is marked failed after {attempts} attempt")]
fn the_staged_story_is_marked_failed(world: &OfflineSyncWorld, attempts: u32) {
    let services = world.services();
    let pending = world
        .runtime()
        .0
        .block_on(services.queue.list_pending())
        .expect("list pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, PendingStatus::Failed);
    assert_eq!(pending[0].attempts, attempts);
    assert!(pending[0].last_attempt_at.is_some());
}

#[then("a warning event is published")]
fn a_warning_event_is_published(world: &OfflineSyncWorld) {
    assert_eq!(world.observer().count_of(SyncEventKind::Warning), 1);
}

#[then("the second request is skipped because a sync is running")]
fn the_second_request_is_skipped(world: &OfflineSyncWorld) {
    assert_eq!(
        world.concurrent_run.get(),
        Some(SyncRun::Skipped(SkipReason::AlreadySyncing))
    );
}

#[then("exactly one sync pass started")]
fn exactly_one_sync_pass_started(world: &OfflineSyncWorld) {
    assert_eq!(world.observer().count_of(SyncEventKind::Start), 1);
    assert_eq!(world.remote().submitted().len(), 1);
}
