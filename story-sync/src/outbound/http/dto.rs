//! DTOs for the story service's JSON envelopes.
//!
//! Responses decode into these transport shapes first, then map into
//! `RemoteStory` records in one pass.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::GeoPoint;
use crate::domain::ports::RemoteStory;

/// Envelope shared by every response: `{ error, message, ... }`.
#[derive(Debug, Deserialize)]
pub(super) struct MessageDto {
    #[serde(default)]
    pub(super) error: bool,
    #[serde(default)]
    pub(super) message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StoryListDto {
    #[serde(default)]
    pub(super) error: bool,
    #[serde(default)]
    pub(super) message: Option<String>,
    #[serde(default)]
    pub(super) list_story: Vec<StoryDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StoryDto {
    pub(super) id: String,
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) description: String,
    #[serde(default)]
    pub(super) photo_url: Option<String>,
    pub(super) created_at: DateTime<Utc>,
    #[serde(default)]
    pub(super) lat: Option<f64>,
    #[serde(default)]
    pub(super) lon: Option<f64>,
}

impl StoryDto {
    fn into_remote(self) -> RemoteStory {
        RemoteStory {
            location: GeoPoint::from_parts(self.lat, self.lon),
            id: self.id,
            name: self.name,
            description: self.description,
            photo_url: self.photo_url,
            created_at: self.created_at,
        }
    }
}

impl StoryListDto {
    pub(super) fn into_remote_stories(self) -> Vec<RemoteStory> {
        self.list_story
            .into_iter()
            .map(StoryDto::into_remote)
            .collect()
    }
}
