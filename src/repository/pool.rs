//! Async SQLite connection factory.
//!
//! diesel-async's SyncConnectionWrapper gives SQLite an async interface by
//! running queries on the blocking pool. SQLite connections are cheap, so a
//! new one is opened per operation instead of pooling.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};
use tracing::debug;

use super::schema_sql::SCHEMA_SQL;

/// Diesel error type alias.
pub type DieselError = diesel::result::Error;

/// Async SQLite connection using SyncConnectionWrapper.
pub type AsyncSqliteConnection = SyncConnectionWrapper<SqliteConnection>;

/// Connection factory for one SQLite database file.
#[derive(Debug, Clone)]
pub struct AsyncSqlitePool {
    database_url: String,
}

impl AsyncSqlitePool {
    /// Create a factory. A leading `sqlite:` (or `sqlite://`) is stripped.
    pub fn new(database_url: &str) -> Self {
        let url = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    pub fn from_path(db_path: &Path) -> Self {
        Self::new(&db_path.display().to_string())
    }

    /// Open a new connection.
    pub async fn get(&self) -> Result<AsyncSqliteConnection, DieselError> {
        AsyncSqliteConnection::establish(&self.database_url)
            .await
            .map_err(super::util::to_diesel_error)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Create any missing tables and indexes.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.get().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        debug!("Schema ready at {}", self.database_url);
        Ok(())
    }
}
