//! Repository for the registry cache and the local tool index.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::error::CoreResult;
use crate::domain::models::{
    LocalToolIndexEntry, RegistryCacheEntry, RegistrySource, ToolServerDescriptor,
    NOT_FOUND_SENTINEL,
};
use crate::infrastructure::database::utils::{from_unix, to_unix};

/// How many local-index candidates the resolver considers.
const LOCAL_INDEX_LIMIT: i64 = 10;

/// SQLite access to `registry_cache` and `local_tool_index`.
#[derive(Clone)]
pub struct RegistryRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CacheRow {
    app_name: String,
    source: String,
    server_name: String,
    server_json: String,
    cached_at: i64,
}

impl From<CacheRow> for RegistryCacheEntry {
    fn from(row: CacheRow) -> Self {
        RegistryCacheEntry {
            app_name: row.app_name,
            source: row.source.parse().unwrap_or(RegistrySource::LocalIndex),
            server_name: row.server_name,
            server_json: row.server_json,
            cached_at: from_unix(row.cached_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct IndexRow {
    package_name: String,
    category: String,
    validated: i64,
    tools_json: String,
    updated_at: i64,
}

impl From<IndexRow> for LocalToolIndexEntry {
    fn from(row: IndexRow) -> Self {
        LocalToolIndexEntry {
            package_name: row.package_name,
            category: row.category,
            validated: row.validated != 0,
            tools_json: row.tools_json,
            updated_at: from_unix(row.updated_at),
        }
    }
}

impl RegistryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_cache(&self, app_name: &str) -> CoreResult<Option<RegistryCacheEntry>> {
        let row: Option<CacheRow> = sqlx::query_as(
            "SELECT app_name, source, server_name, server_json, cached_at
             FROM registry_cache WHERE app_name = ?1",
        )
        .bind(app_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RegistryCacheEntry::from))
    }

    /// Cache a resolved descriptor for an app.
    pub async fn put_cache(
        &self,
        app_name: &str,
        descriptor: &ToolServerDescriptor,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO registry_cache (app_name, source, server_name, server_json, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(app_name) DO UPDATE SET
                 source = excluded.source,
                 server_name = excluded.server_name,
                 server_json = excluded.server_json,
                 cached_at = excluded.cached_at",
        )
        .bind(app_name)
        .bind(descriptor.source.as_str())
        .bind(&descriptor.server_name)
        .bind(descriptor.to_canonical_json())
        .bind(to_unix(now))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record that no source knows a tool server for this app.
    pub async fn put_not_found(&self, app_name: &str, now: DateTime<Utc>) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO registry_cache (app_name, source, server_name, server_json, cached_at)
             VALUES (?1, ?2, ?3, '', ?4)
             ON CONFLICT(app_name) DO UPDATE SET
                 source = excluded.source,
                 server_name = excluded.server_name,
                 server_json = '',
                 cached_at = excluded.cached_at",
        )
        .bind(app_name)
        .bind(RegistrySource::LocalIndex.as_str())
        .bind(NOT_FOUND_SENTINEL)
        .bind(to_unix(now))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_cache(&self, app_name: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM registry_cache WHERE app_name = ?1")
            .bind(app_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Case-insensitive substring match on package name, top candidates by
    /// `(validated DESC, name ASC)`.
    pub async fn search_local_index(&self, query: &str) -> CoreResult<Vec<LocalToolIndexEntry>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let rows: Vec<IndexRow> = sqlx::query_as(
            "SELECT package_name, category, validated, tools_json, updated_at
             FROM local_tool_index
             WHERE LOWER(package_name) LIKE ?1
             ORDER BY validated DESC, package_name ASC
             LIMIT ?2",
        )
        .bind(&pattern)
        .bind(LOCAL_INDEX_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LocalToolIndexEntry::from).collect())
    }

    /// Bulk-refresh the index: replace every row in one transaction,
    /// stamping `updated_at = now`.
    pub async fn refresh_local_index(
        &self,
        entries: &[LocalToolIndexEntry],
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM local_tool_index")
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO local_tool_index
                     (package_name, category, validated, tools_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&entry.package_name)
            .bind(&entry.category)
            .bind(i64::from(entry.validated))
            .bind(&entry.tools_json)
            .bind(to_unix(now))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(entries = entries.len(), "refreshed local tool index");
        Ok(())
    }
}
