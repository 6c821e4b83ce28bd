//! SQLite-backed local store adapter.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::SqliteConnection;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_migrations::MigrationHarness;
use mockable::{Clock, DefaultClock};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::ports::{
    Collection, CollectionIndex, KeyKind, LocalStore, LocalStoreError, RecordKey, StoredDocument,
    check_index, check_put_key,
};

use super::MIGRATIONS;
use super::diesel_error_mapping::{map_connection_error, map_diesel_error};
use super::schema::sync_markers;

type AsyncSqlite = SyncConnectionWrapper<SqliteConnection>;

const CONNECTION_PRAGMAS: &str =
    "PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;";

#[derive(QueryableByName)]
struct DocumentRow {
    #[diesel(sql_type = Text)]
    stored_key: String,
    #[diesel(sql_type = Text)]
    document: String,
}

#[derive(QueryableByName)]
struct KeyRow {
    #[diesel(sql_type = Text)]
    stored_key: String,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

struct OpenStore {
    connection: AsyncSqlite,
    schema_version: u32,
}

/// `LocalStore` persisted in a SQLite database file.
///
/// The connection is opened by `initialize` and released by `shutdown`;
/// every other call fails with `NotInitialized` outside that window.
pub struct SqliteLocalStore {
    database_url: String,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<OpenStore>>,
}

impl fmt::Debug for SqliteLocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteLocalStore")
            .field("database_url", &self.database_url)
            .finish_non_exhaustive()
    }
}

impl SqliteLocalStore {
    /// Create an adapter for the database at `database_url`.
    ///
    /// Nothing is opened until `initialize` runs.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self::with_clock(database_url, Arc::new(DefaultClock))
    }

    /// Create an adapter that stamps marker writes with `clock`.
    pub fn with_clock(database_url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            database_url: database_url.into(),
            clock,
            state: Mutex::new(None),
        }
    }

    /// Path or URL the adapter opens.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

fn open_and_migrate(database_url: &str) -> Result<OpenStore, LocalStoreError> {
    let mut connection = SqliteConnection::establish(database_url).map_err(map_connection_error)?;
    connection
        .batch_execute(CONNECTION_PRAGMAS)
        .map_err(map_diesel_error)?;
    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| LocalStoreError::unavailable(format!("migration failed: {err}")))?;
    for version in &applied {
        info!(%version, "applied local store migration");
    }
    let schema_version = connection
        .applied_migrations()
        .map_err(|err| LocalStoreError::unavailable(format!("migration state unreadable: {err}")))?
        .len();
    Ok(OpenStore {
        connection: SyncConnectionWrapper::new(connection),
        schema_version: u32::try_from(schema_version).unwrap_or(u32::MAX),
    })
}

fn connection(state: &mut Option<OpenStore>) -> Result<&mut AsyncSqlite, LocalStoreError> {
    state
        .as_mut()
        .map(|open| &mut open.connection)
        .ok_or_else(LocalStoreError::not_initialized)
}

fn parse_key(collection: Collection, raw: String) -> Result<RecordKey, LocalStoreError> {
    match collection.key_kind() {
        KeyKind::Text => Ok(RecordKey::Text(raw)),
        KeyKind::AutoIncrement => raw.parse().map(RecordKey::Sequence).map_err(|_| {
            LocalStoreError::serialization(format!("{collection} holds non-integer key {raw}"))
        }),
    }
}

fn into_document(collection: Collection, row: DocumentRow) -> Result<StoredDocument, LocalStoreError> {
    let body = serde_json::from_str::<Value>(&row.document)
        .map_err(|err| LocalStoreError::serialization(err.to_string()))?;
    Ok(StoredDocument {
        key: parse_key(collection, row.stored_key)?,
        body,
    })
}

fn into_documents(
    collection: Collection,
    rows: Vec<DocumentRow>,
) -> Result<Vec<StoredDocument>, LocalStoreError> {
    rows.into_iter()
        .map(|row| into_document(collection, row))
        .collect()
}

fn select_documents(collection: Collection) -> String {
    format!(
        "SELECT CAST(record_key AS TEXT) AS stored_key, document FROM {}",
        collection.name()
    )
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn initialize(&self) -> Result<(), LocalStoreError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Ok(());
        }
        let database_url = self.database_url.clone();
        let opened = tokio::task::spawn_blocking(move || open_and_migrate(&database_url))
            .await
            .map_err(|err| LocalStoreError::unavailable(format!("open task failed: {err}")))??;
        debug!(
            database_url = %self.database_url,
            schema_version = opened.schema_version,
            "sqlite local store opened"
        );
        *state = Some(opened);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), LocalStoreError> {
        let mut state = self.state.lock().await;
        if state.take().is_some() {
            debug!(database_url = %self.database_url, "sqlite local store closed");
        }
        Ok(())
    }

    async fn schema_version(&self) -> Result<u32, LocalStoreError> {
        let state = self.state.lock().await;
        state
            .as_ref()
            .map(|open| open.schema_version)
            .ok_or_else(LocalStoreError::not_initialized)
    }

    async fn put(
        &self,
        collection: Collection,
        key: Option<RecordKey>,
        body: Value,
    ) -> Result<RecordKey, LocalStoreError> {
        let checked = check_put_key(collection, key)?;
        let document = serde_json::to_string(&body)
            .map_err(|err| LocalStoreError::serialization(err.to_string()))?;
        let mut state = self.state.lock().await;
        let conn = connection(&mut state)?;
        let table = collection.name();

        let Some(key) = checked else {
            let row = sql_query(format!(
                "INSERT INTO {table} (document) VALUES (?) \
                 RETURNING CAST(record_key AS TEXT) AS stored_key"
            ))
            .bind::<Text, _>(document)
            .get_result::<KeyRow>(conn)
            .await
            .map_err(map_diesel_error)?;
            return parse_key(collection, row.stored_key);
        };

        let upsert = format!(
            "INSERT INTO {table} (record_key, document) VALUES (?, ?) \
             ON CONFLICT(record_key) DO UPDATE SET document = excluded.document"
        );
        let written = match &key {
            RecordKey::Text(value) => {
                sql_query(upsert)
                    .bind::<Text, _>(value.clone())
                    .bind::<Text, _>(document)
                    .execute(conn)
                    .await
            }
            RecordKey::Sequence(value) => {
                sql_query(upsert)
                    .bind::<BigInt, _>(*value)
                    .bind::<Text, _>(document)
                    .execute(conn)
                    .await
            }
        };
        written.map_err(map_diesel_error)?;
        Ok(key)
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<StoredDocument>, LocalStoreError> {
        let mut state = self.state.lock().await;
        let conn = connection(&mut state)?;
        let rows = sql_query(format!("{} ORDER BY record_key", select_documents(collection)))
            .load::<DocumentRow>(conn)
            .await
            .map_err(map_diesel_error)?;
        into_documents(collection, rows)
    }

    async fn get_all_by_index(
        &self,
        collection: Collection,
        index: CollectionIndex,
    ) -> Result<Vec<StoredDocument>, LocalStoreError> {
        check_index(collection, index)?;
        let mut state = self.state.lock().await;
        let conn = connection(&mut state)?;
        let rows = sql_query(format!(
            "{} ORDER BY json_extract(document, '$.{}'), record_key",
            select_documents(collection),
            index.field()
        ))
        .load::<DocumentRow>(conn)
        .await
        .map_err(map_diesel_error)?;
        into_documents(collection, rows)
    }

    async fn get_by_key(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<Option<StoredDocument>, LocalStoreError> {
        let mut state = self.state.lock().await;
        let conn = connection(&mut state)?;
        let query = format!("{} WHERE record_key = ?", select_documents(collection));
        let rows = match key {
            RecordKey::Text(value) => {
                sql_query(query)
                    .bind::<Text, _>(value.clone())
                    .load::<DocumentRow>(conn)
                    .await
            }
            RecordKey::Sequence(value) => {
                sql_query(query)
                    .bind::<BigInt, _>(*value)
                    .load::<DocumentRow>(conn)
                    .await
            }
        }
        .map_err(map_diesel_error)?;
        rows.into_iter()
            .next()
            .map(|row| into_document(collection, row))
            .transpose()
    }

    async fn delete(&self, collection: Collection, key: &RecordKey) -> Result<bool, LocalStoreError> {
        let mut state = self.state.lock().await;
        let conn = connection(&mut state)?;
        let query = format!("DELETE FROM {} WHERE record_key = ?", collection.name());
        let removed = match key {
            RecordKey::Text(value) => {
                sql_query(query)
                    .bind::<Text, _>(value.clone())
                    .execute(conn)
                    .await
            }
            RecordKey::Sequence(value) => {
                sql_query(query)
                    .bind::<BigInt, _>(*value)
                    .execute(conn)
                    .await
            }
        }
        .map_err(map_diesel_error)?;
        Ok(removed > 0)
    }

    async fn count(&self, collection: Collection) -> Result<u64, LocalStoreError> {
        let mut state = self.state.lock().await;
        let conn = connection(&mut state)?;
        let row = sql_query(format!("SELECT COUNT(*) AS total FROM {}", collection.name()))
            .get_result::<CountRow>(conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(u64::try_from(row.total).unwrap_or_default())
    }

    async fn clear(&self, collection: Collection) -> Result<(), LocalStoreError> {
        let mut state = self.state.lock().await;
        let conn = connection(&mut state)?;
        let removed = sql_query(format!("DELETE FROM {}", collection.name()))
            .execute(conn)
            .await
            .map_err(map_diesel_error)?;
        debug!(%collection, removed, "cleared collection");
        Ok(())
    }

    async fn read_marker(&self, name: &str) -> Result<Option<String>, LocalStoreError> {
        let mut state = self.state.lock().await;
        let conn = connection(&mut state)?;
        sync_markers::table
            .find(name.to_owned())
            .select(sync_markers::value)
            .first::<String>(conn)
            .await
            .optional()
            .map_err(map_diesel_error)
    }

    async fn write_marker(&self, name: &str, value: &str) -> Result<(), LocalStoreError> {
        let updated_at = self.clock.utc().to_rfc3339();
        let mut state = self.state.lock().await;
        let conn = connection(&mut state)?;
        diesel::insert_into(sync_markers::table)
            .values((
                sync_markers::name.eq(name.to_owned()),
                sync_markers::value.eq(value.to_owned()),
                sync_markers::updated_at.eq(updated_at),
            ))
            .on_conflict(sync_markers::name)
            .do_update()
            .set((
                sync_markers::value.eq(excluded(sync_markers::value)),
                sync_markers::updated_at.eq(excluded(sync_markers::updated_at)),
            ))
            .execute(conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }
}
