//! Idempotent schema for the core database.
//!
//! Every statement is safe to re-run: `CREATE TABLE IF NOT EXISTS` for
//! tables and indexes, and forward-only `ADD COLUMN` guarded by a probe
//! `SELECT` for columns added after the first release.

use sqlx::SqlitePool;

use crate::domain::error::CoreResult;

const TABLES: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS apps (
        app_name         TEXT PRIMARY KEY,
        display_name     TEXT NOT NULL,
        tool_server_name TEXT,
        created_at       INTEGER NOT NULL,
        last_seen_at     INTEGER NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS app_actions (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        app_name       TEXT NOT NULL REFERENCES apps(app_name) ON DELETE CASCADE,
        position       INTEGER NOT NULL,
        kind           TEXT NOT NULL,
        action_name    TEXT NOT NULL,
        action_payload TEXT NOT NULL,
        enabled        INTEGER NOT NULL DEFAULT 1,
        usage_count    INTEGER NOT NULL DEFAULT 0,
        last_used_at   INTEGER,
        UNIQUE(app_name, position)
    )",
    r"
    CREATE TABLE IF NOT EXISTS registry_cache (
        app_name    TEXT PRIMARY KEY,
        source      TEXT NOT NULL,
        server_name TEXT NOT NULL,
        server_json TEXT NOT NULL,
        cached_at   INTEGER NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS local_tool_index (
        package_name TEXT PRIMARY KEY,
        category     TEXT NOT NULL DEFAULT '',
        validated    INTEGER NOT NULL DEFAULT 0,
        tools_json   TEXT NOT NULL DEFAULT '{}',
        updated_at   INTEGER NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS ui_interactions (
        id                     INTEGER PRIMARY KEY AUTOINCREMENT,
        app_name               TEXT NOT NULL REFERENCES apps(app_name) ON DELETE CASCADE,
        window_title           TEXT,
        interaction_type       TEXT NOT NULL,
        element_name           TEXT,
        simplified_description TEXT NOT NULL,
        timestamp              INTEGER NOT NULL,
        expires_at             INTEGER NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS workflows (
        id                  TEXT PRIMARY KEY,
        app_name            TEXT NOT NULL,
        workflow_text       TEXT NOT NULL,
        raw_interaction_ids TEXT NOT NULL,
        created_at          INTEGER NOT NULL,
        confidence          REAL NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS workflow_embeddings (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        workflow_id   TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
        app_name      TEXT NOT NULL,
        embedding     BLOB NOT NULL,
        cluster_label INTEGER,
        created_at    INTEGER NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS workflow_clusters (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        app_name            TEXT NOT NULL,
        cluster_label       INTEGER NOT NULL,
        representative_text TEXT NOT NULL,
        workflow_count      INTEGER NOT NULL DEFAULT 1,
        created_at          INTEGER NOT NULL,
        updated_at          INTEGER NOT NULL,
        UNIQUE(app_name, cluster_label)
    )",
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_interactions_app_ts ON ui_interactions(app_name, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_interactions_expiry ON ui_interactions(expires_at)",
    "CREATE INDEX IF NOT EXISTS idx_workflows_app ON workflows(app_name)",
    "CREATE INDEX IF NOT EXISTS idx_clusters_app ON workflow_clusters(app_name)",
    "CREATE INDEX IF NOT EXISTS idx_embeddings_label ON workflow_embeddings(cluster_label)",
    "CREATE INDEX IF NOT EXISTS idx_actions_app ON app_actions(app_name)",
];

/// Columns added after the first schema revision: probe with a `SELECT`,
/// and only on failure run the `ALTER`.
const COLUMN_UPGRADES: &[(&str, &str)] = &[(
    "SELECT tool_server_name FROM apps LIMIT 1",
    "ALTER TABLE apps ADD COLUMN tool_server_name TEXT",
)];

/// Apply the full schema. Idempotent.
pub async fn apply(pool: &SqlitePool) -> CoreResult<()> {
    for statement in TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    for statement in INDEXES {
        sqlx::query(statement).execute(pool).await?;
    }
    for (probe, upgrade) in COLUMN_UPGRADES {
        if sqlx::query(probe).fetch_optional(pool).await.is_err() {
            tracing::info!(statement = *upgrade, "applying schema upgrade");
            sqlx::query(upgrade).execute(pool).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn column_upgrade_fills_in_missing_column() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();

        // An apps table from before tool_server_name existed.
        sqlx::query(
            "CREATE TABLE apps (
                app_name TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_seen_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        apply(&pool).await.unwrap();

        sqlx::query("SELECT tool_server_name FROM apps LIMIT 1")
            .fetch_optional(&pool)
            .await
            .expect("upgraded column should be queryable");
    }

    #[tokio::test]
    async fn unique_position_constraint_holds() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        apply(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO apps (app_name, display_name, created_at, last_seen_at)
             VALUES ('notes', 'Notes', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let insert = "INSERT INTO app_actions
             (app_name, position, kind, action_name, action_payload)
             VALUES ('notes', 0, 'keybind', 'Copy', '{}')";
        sqlx::query(insert).execute(&pool).await.unwrap();
        assert!(sqlx::query(insert).execute(&pool).await.is_err());
    }
}
