//! User favourites kept in their own collection.
//!
//! Favourites are never touched by synchronisation; only explicit add and
//! remove calls change them.

use std::sync::Arc;

use mockable::Clock;
use tracing::info;

use crate::domain::ports::{Collection, CollectionIndex, LocalStore, RecordKey};
use crate::domain::store_mapping::{decode_body, encode_body, map_store_error};
use crate::domain::{Error, FavoriteAdded, FavoriteStory, Story};

/// Manages the favourites collection.
#[derive(Clone)]
pub struct FavoritesService {
    store: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
}

impl FavoritesService {
    /// Build the service over `store`.
    pub fn new(store: Arc<dyn LocalStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Add a copy of `story` unless its id is already a favourite.
    pub async fn add(&self, story: &Story) -> Result<FavoriteAdded, Error> {
        if self.is_favorite(&story.id).await? {
            return Ok(FavoriteAdded::AlreadyExists);
        }
        let favorite = FavoriteStory {
            story: story.clone(),
            favorite_added_at: self.clock.utc(),
        };
        let body = encode_body(&favorite)?;
        self.store
            .put(
                Collection::Favorites,
                Some(RecordKey::Text(story.id.clone())),
                body,
            )
            .await
            .map_err(map_store_error)?;
        info!(story_id = %story.id, "favourite added");
        Ok(FavoriteAdded::Added)
    }

    /// Remove a favourite. Returns whether one was removed.
    pub async fn remove(&self, story_id: &str) -> Result<bool, Error> {
        self.store
            .delete(Collection::Favorites, &favorite_key(story_id))
            .await
            .map_err(map_store_error)
    }

    /// Whether `story_id` is a favourite.
    pub async fn is_favorite(&self, story_id: &str) -> Result<bool, Error> {
        let found = self
            .store
            .get_by_key(Collection::Favorites, &favorite_key(story_id))
            .await
            .map_err(map_store_error)?;
        Ok(found.is_some())
    }

    /// All favourites, most recently created story first.
    pub async fn list(&self) -> Result<Vec<FavoriteStory>, Error> {
        let documents = self
            .store
            .get_all_by_index(Collection::Favorites, CollectionIndex::CreatedAt)
            .await
            .map_err(map_store_error)?;
        let mut favorites = documents
            .iter()
            .map(decode_body::<FavoriteStory>)
            .collect::<Result<Vec<_>, _>>()?;
        favorites.reverse();
        Ok(favorites)
    }

    /// Number of favourites.
    pub async fn count(&self) -> Result<u64, Error> {
        self.store
            .count(Collection::Favorites)
            .await
            .map_err(map_store_error)
    }

    /// Remove every favourite.
    pub async fn clear(&self) -> Result<(), Error> {
        self.store
            .clear(Collection::Favorites)
            .await
            .map_err(map_store_error)
    }
}

fn favorite_key(story_id: &str) -> RecordKey {
    RecordKey::Text(story_id.to_owned())
}
