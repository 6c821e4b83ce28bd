//! SQLite persistence adapter using Diesel.
//!
//! The local store is a single SQLite file opened through Diesel and wrapped
//! with `diesel-async`'s `SyncConnectionWrapper` so every port call can be
//! awaited. Each collection is a table keyed by `record_key` with the record
//! body held as a JSON `document`; declared indexes are expression indexes
//! over `json_extract`.
//!
//! # Schema versions
//!
//! Migrations are embedded at compile time and applied on `initialize`.
//! Every migration is additive: opening a version 1 file creates only the
//! collections version 2 introduces and leaves existing rows untouched.
//!
//! # Example
//!
//! ```ignore
//! use story_sync::outbound::persistence::SqliteLocalStore;
//!
//! let store = SqliteLocalStore::new("stories.db");
//! store.initialize().await?;
//! ```

mod diesel_error_mapping;
mod schema;
mod sqlite_local_store;

use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub use sqlite_local_store::SqliteLocalStore;

/// Migrations bundled into the binary, applied in order on open.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
