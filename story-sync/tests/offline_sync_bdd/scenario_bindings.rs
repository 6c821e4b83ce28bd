//! Scenario bindings for offline sync BDD tests.

use super::*;
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/offline_sync.feature",
    name = "Stories written offline are delivered when connectivity returns"
)]
fn stories_written_offline_are_delivered(world: OfflineSyncWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/offline_sync.feature",
    name = "A failed submission stays queued with its attempt recorded"
)]
fn failed_submission_stays_queued(world: OfflineSyncWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/offline_sync.feature",
    name = "Retrying a failed story delivers it"
)]
fn retrying_a_failed_story_delivers_it(world: OfflineSyncWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/offline_sync.feature",
    name = "A sync request during a running pass is skipped"
)]
fn sync_request_during_running_pass_is_skipped(world: OfflineSyncWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/offline_sync.feature",
    name = "Posting online with an unreachable service stages the story"
)]
fn posting_with_unreachable_service_stages_the_story(world: OfflineSyncWorld) {
    drop(world);
}
