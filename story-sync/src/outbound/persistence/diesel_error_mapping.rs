//! Diesel error mapping for the SQLite local store.

use diesel::result::{ConnectionError, DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::LocalStoreError;

/// SQLite reports contention and I/O trouble through message text only.
fn is_transient(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    ["database is locked", "database is busy", "disk i/o error", "unable to open"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

/// Map Diesel query failures onto the store error surface.
pub(super) fn map_diesel_error(error: DieselError) -> LocalStoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => LocalStoreError::query("record not found"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            LocalStoreError::unavailable("database connection closed")
        }
        DieselError::DatabaseError(_, info) if is_transient(info.message()) => {
            LocalStoreError::unavailable(info.message())
        }
        DieselError::DatabaseError(_, info) => LocalStoreError::query(info.message()),
        DieselError::DeserializationError(err) => LocalStoreError::serialization(err.to_string()),
        DieselError::SerializationError(err) => LocalStoreError::serialization(err.to_string()),
        other => LocalStoreError::query(other.to_string()),
    }
}

/// Opening the database file failed.
pub(super) fn map_connection_error(error: ConnectionError) -> LocalStoreError {
    debug!(%error, "sqlite connection failed");
    LocalStoreError::unavailable(error.to_string())
}
