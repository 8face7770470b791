//! Database connection pool manager.
//!
//! The `StoreHandle` is the only component that opens the database; every
//! repository receives a pool clone from it. No back-channels.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::domain::error::{CoreError, CoreResult};
use crate::infrastructure::database::schema;

/// Owner of the SQLite connection pool, configured for concurrent access.
#[derive(Clone)]
pub struct StoreHandle {
    pool: SqlitePool,
}

impl StoreHandle {
    /// Open (creating if missing) the database at `database_url` with WAL
    /// mode enabled.
    ///
    /// # Configuration
    /// - Journal mode: WAL (Write-Ahead Logging)
    /// - Synchronous: NORMAL
    /// - Foreign keys: Enabled
    /// - Busy timeout: 5 seconds
    pub async fn new(database_url: &str) -> CoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| CoreError::Internal(format!("invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        // An in-memory database lives and dies with its connection, so it
        // must be pinned to a single one that never idles out.
        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(10)
                .idle_timeout(Duration::from_secs(30))
                .max_lifetime(Duration::from_secs(1800))
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| CoreError::Internal(format!("failed to create connection pool: {e}")))?;

        Ok(Self { pool })
    }

    /// Apply the idempotent schema. Safe to call on every startup; applies
    /// forward-only column additions when upgrading an older database.
    pub async fn migrate(&self) -> CoreResult<()> {
        schema::apply(&self.pool).await
    }

    /// Pool reference for repository construction.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool gracefully. Call during shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
