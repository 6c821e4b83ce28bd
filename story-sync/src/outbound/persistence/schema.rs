//! Diesel table definitions for the SQLite schema.
//!
//! Only tables queried through the DSL are declared here. Collection tables
//! are addressed with `sql_query` because their ordering is over JSON paths.

diesel::table! {
    /// Named bookkeeping values such as the last sync time.
    sync_markers (name) {
        /// Marker name.
        name -> Text,
        /// Marker value, stored verbatim.
        value -> Text,
        /// RFC 3339 time of the last write.
        updated_at -> Text,
    }
}
