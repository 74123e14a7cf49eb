use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::debug;

use super::{DocumentStore, StoreError};
use crate::document::SampleDocument;

/// One table per collection
pub struct SqliteStore(Connection);

impl SqliteStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.is_dir() {
                return Err(StoreError::Unavailable(format!(
                    "directory `{}` does not exist",
                    dir.display()
                )));
            }
        }
        debug!("opening sqlite store at {}", path.display());
        Ok(Self(Connection::open(path).await?))
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self(Connection::open_in_memory().await?))
    }
}

/// Every collection table carries this prefix, so device ids never collide with
/// SQLite's reserved `sqlite_` names or with tables the store does not own
const TABLE_PREFIX: &str = "samples_";

/// Quoted table identifier for a collection
fn table_for(collection: &str) -> String {
    format!("\"{TABLE_PREFIX}{}\"", collection.replace('"', "\"\""))
}

impl DocumentStore for SqliteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.0
            .call(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
            .await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let tables = self
            .0
            .call(|conn| {
                // `substr` compares case-sensitively, unlike LIKE
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'table' AND substr(name, 1, length(?1)) = ?1
                     ORDER BY name",
                )?;
                let tables = stmt
                    .query_map([TABLE_PREFIX], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tables)
            })
            .await?;

        Ok(tables
            .into_iter()
            .filter_map(|table| table.strip_prefix(TABLE_PREFIX).map(str::to_string))
            .collect())
    }

    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id            INTEGER PRIMARY KEY,
                timestamp     TEXT NOT NULL,
                sampling_rate REAL NOT NULL,
                shape_rows    INTEGER NOT NULL,
                shape_columns INTEGER NOT NULL,
                dtype         TEXT NOT NULL,
                data          BLOB NOT NULL
            )",
            table_for(name)
        );
        self.0.call(move |conn| Ok(conn.execute(&sql, ())?)).await?;
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: &SampleDocument) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (timestamp, sampling_rate, shape_rows, shape_columns, dtype, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            table_for(collection)
        );
        let params = (
            doc.timestamp.to_string(),
            doc.sampling_rate,
            doc.data_shape.0 as i64,
            doc.data_shape.1 as i64,
            doc.data_dtype.to_string(),
            doc.data.clone(),
        );
        self.0.call(move |conn| Ok(conn.execute(&sql, params)?)).await?;
        Ok(())
    }
}
