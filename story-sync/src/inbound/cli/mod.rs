//! Command-line adapter over the composed client services.
//!
//! Parsing is clap-derived. Each command calls one domain service and
//! renders the result as plain text; `watch` keeps auto sync running until
//! interrupted.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::bootstrap::ClientServices;
use crate::domain::{
    AuthToken, Error, GeoPoint, GeoPointError, ListingSource, StoryDraft, StoryDraftError,
    StoryListing, SyncStatusEvent,
};

mod photo;
mod render;

/// `story-sync` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "story-sync",
    about = "Offline-first story client with a local pending-write queue",
    version
)]
pub struct CliArgs {
    /// SQLite database file. Overrides `STORY_SYNC_DATABASE_PATH`.
    #[arg(long = "database", value_name = "path", global = true)]
    pub database: Option<PathBuf>,
    /// Treat the host as offline regardless of the reachability probe.
    #[arg(long, global = true)]
    pub offline: bool,
    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Publish a story, staging it locally when offline.
    Post {
        /// Story text.
        description: String,
        /// Photo file to attach.
        #[arg(long, value_name = "path")]
        photo: Option<PathBuf>,
        /// Latitude in degrees.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Longitude in degrees.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },
    /// Drain the pending queue once.
    Sync,
    /// Show connectivity, queue, and cache state.
    Status,
    /// List staged stories in submission order.
    Pending,
    /// List stories, falling back to the cache when unreachable.
    Stories {
        /// Only stories carrying a location.
        #[arg(long)]
        with_location: bool,
        /// Read the local cache without contacting the service.
        #[arg(long)]
        cached: bool,
    },
    /// Manage favourite stories.
    Favorites {
        /// Favourites action.
        #[command(subcommand)]
        action: FavoritesCommand,
    },
    /// Probe connectivity and sync automatically until interrupted.
    Watch,
}

/// Favourites actions.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum FavoritesCommand {
    /// List favourites, newest first.
    List,
    /// Mark a cached story as favourite.
    Add {
        /// Story id.
        story_id: String,
    },
    /// Remove a favourite.
    Remove {
        /// Story id.
        story_id: String,
    },
}

/// Failures surfaced by a command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A domain service failed.
    #[error(transparent)]
    Domain(#[from] Error),
    /// The draft was invalid.
    #[error(transparent)]
    Draft(#[from] StoryDraftError),
    /// The coordinates were invalid.
    #[error(transparent)]
    Location(#[from] GeoPointError),
    /// Reading input or writing output failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn build_draft(
    description: String,
    photo_path: Option<PathBuf>,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<StoryDraft, CliError> {
    let location = match (lat, lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
        _ => None,
    };
    let photo = photo_path
        .as_deref()
        .map(photo::load_photo)
        .transpose()?;
    Ok(StoryDraft::new(description, location, photo)?)
}

/// Run one command against `services`, writing results to `out`.
pub async fn run_command(
    command: Command,
    services: &ClientServices,
    token: &AuthToken,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Post {
            description,
            photo,
            lat,
            lon,
        } => {
            let draft = build_draft(description, photo, lat, lon)?;
            let outcome = services.publisher.publish(token, &draft).await?;
            render::publish(out, &outcome)?;
        }
        Command::Sync => {
            let events = Arc::new(Mutex::new(Vec::<SyncStatusEvent>::new()));
            let sink = Arc::clone(&events);
            let subscription = services.engine.on_sync_status_change(move |event| {
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event.clone());
            });
            let run = services.engine.sync_pending(token).await;
            subscription.unsubscribe();
            let events = events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            render::sync_run(out, &events, run?)?;
        }
        Command::Status => {
            let snapshot = services.engine.status().await?;
            let stats = services.cache.stats().await?;
            render::status(out, &snapshot, &stats)?;
        }
        Command::Pending => {
            let items = services.queue.list_pending().await?;
            render::pending(out, &items)?;
        }
        Command::Stories {
            with_location,
            cached,
        } => {
            let listing = if cached {
                let mut stories = services.cache.cached_stories().await?;
                if with_location {
                    stories.retain(|story| story.location.is_some());
                }
                StoryListing {
                    stories,
                    source: ListingSource::Cache,
                }
            } else {
                services.publisher.list_stories(token, with_location).await?
            };
            render::listing(out, &listing)?;
        }
        Command::Favorites { action } => run_favorites(action, services, out).await?,
        Command::Watch => watch(services, token).await?,
    }
    Ok(())
}

async fn run_favorites(
    action: FavoritesCommand,
    services: &ClientServices,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match action {
        FavoritesCommand::List => {
            let items = services.favorites.list().await?;
            render::favorites(out, &items)?;
        }
        FavoritesCommand::Add { story_id } => {
            let story = services
                .cache
                .cached_stories()
                .await?
                .into_iter()
                .find(|story| story.id == story_id)
                .ok_or_else(|| Error::not_found(format!("story {story_id} is not cached")))?;
            let added = services.favorites.add(&story).await?;
            render::favorite_added(out, &story_id, added)?;
        }
        FavoritesCommand::Remove { story_id } => {
            let removed = services.favorites.remove(&story_id).await?;
            render::favorite_removed(out, &story_id, removed)?;
        }
    }
    Ok(())
}

async fn watch(services: &ClientServices, token: &AuthToken) -> Result<(), CliError> {
    let subscription = services.engine.on_sync_status_change(|event| {
        let mut stdout = io::stdout().lock();
        if let Err(err) = render::sync_event(&mut stdout, event) {
            warn!(error = %err, "failed to print sync status");
        }
    });
    let tasks = services.spawn_background(token.clone());
    info!("watching connectivity; press Ctrl-C to stop");

    // Drain anything staged before the watch started.
    if services.connectivity().is_online() {
        services.engine.sync_pending(token).await?;
    }

    let interrupted = tokio::signal::ctrl_c().await;
    tasks.stop().await;
    subscription.unsubscribe();
    interrupted?;
    Ok(())
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn post_accepts_negative_coordinates() {
        let args = CliArgs::try_parse_from([
            "story-sync",
            "post",
            "Rainy Jakarta",
            "--lat",
            "-6.2",
            "--lon",
            "106.8",
        ])
        .expect("arguments parse");

        assert_eq!(
            args.command,
            Command::Post {
                description: "Rainy Jakarta".to_owned(),
                photo: None,
                lat: Some(-6.2),
                lon: Some(106.8),
            }
        );
    }

    #[rstest]
    fn latitude_requires_longitude() {
        let result = CliArgs::try_parse_from(["story-sync", "post", "x", "--lat", "1.0"]);
        assert!(result.is_err());
    }

    #[rstest]
    fn global_flags_follow_subcommands() {
        let args = CliArgs::try_parse_from([
            "story-sync",
            "favorites",
            "add",
            "story-1",
            "--offline",
            "--database",
            "/tmp/s.db",
        ])
        .expect("arguments parse");

        assert!(args.offline);
        assert_eq!(args.database, Some(PathBuf::from("/tmp/s.db")));
        assert_eq!(
            args.command,
            Command::Favorites {
                action: FavoritesCommand::Add {
                    story_id: "story-1".to_owned()
                }
            }
        );
    }

    #[rstest]
    fn out_of_range_coordinates_fail_draft_building() {
        let err = build_draft("x".to_owned(), None, Some(95.0), Some(0.0))
            .expect_err("latitude out of range");
        assert!(matches!(
            err,
            CliError::Location(GeoPointError::LatitudeOutOfRange)
        ));
    }

    #[rstest]
    fn blank_descriptions_fail_draft_building() {
        let err = build_draft("   ".to_owned(), None, None, None).expect_err("blank");
        assert!(matches!(err, CliError::Draft(StoryDraftError::EmptyDescription)));
    }
}
