//! Repository for captured UI interactions.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::error::CoreResult;
use crate::domain::models::InteractionEvent;
use crate::infrastructure::database::utils::{from_unix, to_unix};

/// SQLite access to `ui_interactions`.
#[derive(Clone)]
pub struct InteractionRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct InteractionRow {
    id: i64,
    app_name: String,
    window_title: Option<String>,
    interaction_type: String,
    element_name: Option<String>,
    simplified_description: String,
    timestamp: i64,
    expires_at: i64,
}

impl From<InteractionRow> for InteractionEvent {
    fn from(row: InteractionRow) -> Self {
        InteractionEvent {
            id: row.id,
            app_name: row.app_name,
            window_title: row.window_title,
            interaction_type: row.interaction_type,
            element_name: row.element_name,
            simplified_description: row.simplified_description,
            timestamp: from_unix(row.timestamp),
            expires_at: from_unix(row.expires_at),
        }
    }
}

impl InteractionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one event, returning its row id.
    pub async fn insert(&self, event: &InteractionEvent) -> CoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO ui_interactions
                 (app_name, window_title, interaction_type, element_name,
                  simplified_description, timestamp, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&event.app_name)
        .bind(&event.window_title)
        .bind(&event.interaction_type)
        .bind(&event.element_name)
        .bind(&event.simplified_description)
        .bind(to_unix(event.timestamp))
        .bind(to_unix(event.expires_at))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Remove everything past its TTL. Returns the number of rows deleted.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM ui_interactions WHERE expires_at < ?1")
            .bind(to_unix(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Events for one app since `since`, oldest first.
    pub async fn recent_for_app(
        &self,
        app_name: &str,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<InteractionEvent>> {
        let rows: Vec<InteractionRow> = sqlx::query_as(
            "SELECT id, app_name, window_title, interaction_type, element_name,
                    simplified_description, timestamp, expires_at
             FROM ui_interactions
             WHERE app_name = ?1 AND timestamp >= ?2
             ORDER BY timestamp ASC",
        )
        .bind(app_name)
        .bind(to_unix(since))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InteractionEvent::from).collect())
    }

    /// Apps with at least `min_count` events since `since`.
    pub async fn apps_with_recent(
        &self,
        min_count: usize,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT app_name FROM ui_interactions
             WHERE timestamp >= ?1
             GROUP BY app_name
             HAVING COUNT(*) >= ?2
             ORDER BY app_name",
        )
        .bind(to_unix(since))
        .bind(min_count as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{default_action_specs, AppRecord};
    use crate::infrastructure::database::{AppRepository, StoreHandle};
    use chrono::Duration;

    async fn repos() -> (AppRepository, InteractionRepository) {
        let store = StoreHandle::new("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        (
            AppRepository::new(store.pool().clone()),
            InteractionRepository::new(store.pool().clone()),
        )
    }

    async fn seed_app(apps: &AppRepository, name: &str) {
        let record = AppRecord::new(name, name, None);
        apps.save_app_with_slots(&record, &default_action_specs())
            .await
            .unwrap();
    }

    fn event_at(app: &str, ts: DateTime<Utc>) -> InteractionEvent {
        InteractionEvent::new(app, None, "click", Some("button".into()), "clicked button", ts)
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let (apps, repo) = repos().await;
        seed_app(&apps, "notes").await;
        let now = Utc::now();

        repo.insert(&event_at("notes", now - Duration::seconds(1_000)))
            .await
            .unwrap();
        repo.insert(&event_at("notes", now)).await.unwrap();

        let removed = repo.sweep_expired(now).await.unwrap();
        assert_eq!(removed, 1);

        let remaining = repo.recent_for_app("notes", now - Duration::hours(1)).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn apps_with_recent_applies_threshold() {
        let (apps, repo) = repos().await;
        seed_app(&apps, "notes").await;
        seed_app(&apps, "mail").await;
        let now = Utc::now();

        for _ in 0..3 {
            repo.insert(&event_at("notes", now)).await.unwrap();
        }
        repo.insert(&event_at("mail", now)).await.unwrap();

        let busy = repo
            .apps_with_recent(3, now - Duration::seconds(900))
            .await
            .unwrap();
        assert_eq!(busy, vec!["notes".to_string()]);
    }

    #[tokio::test]
    async fn deleting_app_cascades_to_interactions() {
        let (apps, repo) = repos().await;
        seed_app(&apps, "notes").await;
        let now = Utc::now();
        repo.insert(&event_at("notes", now)).await.unwrap();

        apps.delete_app("notes").await.unwrap();
        let remaining = repo.recent_for_app("notes", now - Duration::hours(1)).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn recent_events_come_back_in_order() {
        let (apps, repo) = repos().await;
        seed_app(&apps, "notes").await;
        let now = Utc::now();

        repo.insert(&event_at("notes", now - Duration::seconds(30)))
            .await
            .unwrap();
        repo.insert(&event_at("notes", now - Duration::seconds(10)))
            .await
            .unwrap();

        let events = repo
            .recent_for_app("notes", now - Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp <= events[1].timestamp);
    }
}
