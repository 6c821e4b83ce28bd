//! Favourite stories keyed by the originating story id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::story::Story;

/// A self-contained copy of a story the user marked as favourite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStory {
    /// Copy of the story at the time it was favourited.
    #[serde(flatten)]
    pub story: Story,
    /// When the favourite was added.
    pub favorite_added_at: DateTime<Utc>,
}

impl FavoriteStory {
    /// Story id, also the favourite's key.
    pub fn id(&self) -> &str {
        &self.story.id
    }
}

/// Result of adding a favourite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteAdded {
    /// A new favourite was written.
    Added,
    /// The story was already a favourite; nothing was written.
    AlreadyExists,
}
