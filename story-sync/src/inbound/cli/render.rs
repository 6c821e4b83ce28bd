//! Plain-text rendering of command results.

use std::io::{self, Write};

use chrono::{DateTime, Utc};

use crate::domain::{
    FavoriteAdded, FavoriteStory, ListingSource, PendingStatus, PendingStory, PublishOutcome,
    SkipReason, StorageStats, Story, StoryListing, SyncRun, SyncStatusEvent, SyncStatusSnapshot,
};

fn timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub(super) fn publish(out: &mut impl Write, outcome: &PublishOutcome) -> io::Result<()> {
    match outcome {
        PublishOutcome::Published { message } => writeln!(out, "published: {message}"),
        PublishOutcome::Staged { local_id } => writeln!(
            out,
            "saved offline as #{local_id}; it will sync when back online"
        ),
    }
}

pub(super) fn sync_event(out: &mut impl Write, event: &SyncStatusEvent) -> io::Result<()> {
    writeln!(out, "[{}] {}", event.kind, event.message)
}

pub(super) fn sync_run(
    out: &mut impl Write,
    events: &[SyncStatusEvent],
    run: SyncRun,
) -> io::Result<()> {
    for event in events {
        sync_event(out, event)?;
    }
    match run {
        SyncRun::Skipped(SkipReason::AlreadySyncing) => {
            writeln!(out, "sync already in progress")
        }
        SyncRun::Skipped(SkipReason::Offline) => writeln!(out, "offline; nothing synced"),
        SyncRun::Completed(outcome) => writeln!(
            out,
            "synced {}, failed {}, deferred {}",
            outcome.synced_count, outcome.failed_count, outcome.deferred_count
        ),
    }
}

pub(super) fn status(
    out: &mut impl Write,
    snapshot: &SyncStatusSnapshot,
    stats: &StorageStats,
) -> io::Result<()> {
    writeln!(out, "online:        {}", yes_no(snapshot.is_online))?;
    writeln!(out, "syncing:       {}", yes_no(snapshot.is_syncing))?;
    writeln!(out, "cached:        {}", stats.total_stories)?;
    writeln!(out, "pending sync:  {}", stats.pending_sync)?;
    let last_sync = snapshot
        .last_sync
        .or(stats.last_sync)
        .map_or_else(|| "never".to_owned(), timestamp);
    writeln!(out, "last sync:     {last_sync}")
}

pub(super) fn pending(out: &mut impl Write, items: &[PendingStory]) -> io::Result<()> {
    if items.is_empty() {
        return writeln!(out, "no pending stories");
    }
    for item in items {
        let status = match item.status {
            PendingStatus::Pending => "pending",
            PendingStatus::Failed => "failed",
        };
        writeln!(
            out,
            "#{} [{status}, attempts {}] {} {}",
            item.local_id,
            item.attempts,
            timestamp(item.created_at),
            item.description
        )?;
    }
    Ok(())
}

fn story_line(out: &mut impl Write, story: &Story) -> io::Result<()> {
    let author = story.name.as_deref().unwrap_or("anonymous");
    match story.location {
        Some(point) => writeln!(
            out,
            "{} {} {author}: {} ({:.2}, {:.2})",
            story.id,
            timestamp(story.created_at),
            story.description,
            point.latitude(),
            point.longitude()
        ),
        None => writeln!(
            out,
            "{} {} {author}: {}",
            story.id,
            timestamp(story.created_at),
            story.description
        ),
    }
}

pub(super) fn listing(out: &mut impl Write, listing: &StoryListing) -> io::Result<()> {
    if listing.source == ListingSource::Cache {
        writeln!(out, "(showing cached stories)")?;
    }
    if listing.stories.is_empty() {
        return writeln!(out, "no stories");
    }
    for story in &listing.stories {
        story_line(out, story)?;
    }
    Ok(())
}

pub(super) fn favorites(out: &mut impl Write, items: &[FavoriteStory]) -> io::Result<()> {
    if items.is_empty() {
        return writeln!(out, "no favourites");
    }
    for item in items {
        story_line(out, &item.story)?;
    }
    Ok(())
}

pub(super) fn favorite_added(out: &mut impl Write, id: &str, added: FavoriteAdded) -> io::Result<()> {
    match added {
        FavoriteAdded::Added => writeln!(out, "added {id} to favourites"),
        FavoriteAdded::AlreadyExists => writeln!(out, "{id} is already a favourite"),
    }
}

pub(super) fn favorite_removed(out: &mut impl Write, id: &str, removed: bool) -> io::Result<()> {
    if removed {
        writeln!(out, "removed {id} from favourites")
    } else {
        writeln!(out, "{id} was not a favourite")
    }
}
