//! Repository for app records and their ring slots.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{
    ActionKind, ActionPayload, ActionSpec, AppRecord, RingSlot, RING_SIZE,
};
use crate::infrastructure::database::utils::{from_unix, to_unix};

/// SQLite access to `apps` and `app_actions`.
#[derive(Clone)]
pub struct AppRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: i64,
    app_name: String,
    position: i64,
    kind: String,
    action_name: String,
    action_payload: String,
    enabled: i64,
    usage_count: i64,
    last_used_at: Option<i64>,
}

impl SlotRow {
    fn into_slot(self) -> CoreResult<RingSlot> {
        let kind: ActionKind = self
            .kind
            .parse()
            .map_err(|e: String| CoreError::Internal(format!("corrupt slot row: {e}")))?;
        let payload_value: serde_json::Value =
            serde_json::from_str(&self.action_payload).unwrap_or(serde_json::Value::Null);
        Ok(RingSlot {
            id: self.id,
            app_name: self.app_name,
            position: self.position as u8,
            kind,
            action_name: self.action_name,
            payload: ActionPayload::from_value(kind, payload_value),
            enabled: self.enabled != 0,
            usage_count: self.usage_count,
            last_used_at: self.last_used_at.map(from_unix),
        })
    }
}

#[derive(sqlx::FromRow)]
struct AppRow {
    app_name: String,
    display_name: String,
    tool_server_name: Option<String>,
    created_at: i64,
    last_seen_at: i64,
}

impl From<AppRow> for AppRecord {
    fn from(row: AppRow) -> Self {
        AppRecord {
            app_name: row.app_name,
            display_name: row.display_name,
            tool_server_name: row.tool_server_name,
            created_at: from_unix(row.created_at),
            last_seen_at: from_unix(row.last_seen_at),
        }
    }
}

impl AppRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert the app record and replace its slots with the given eight
    /// specs, in one transaction. Existing usage counters are reset; this
    /// is the documented save semantics.
    pub async fn save_app_with_slots(
        &self,
        app: &AppRecord,
        specs: &[ActionSpec],
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO apps (app_name, display_name, tool_server_name, created_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(app_name) DO UPDATE SET
                 display_name = excluded.display_name,
                 tool_server_name = excluded.tool_server_name,
                 last_seen_at = excluded.last_seen_at",
        )
        .bind(&app.app_name)
        .bind(&app.display_name)
        .bind(&app.tool_server_name)
        .bind(to_unix(app.created_at))
        .bind(to_unix(app.last_seen_at))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM app_actions WHERE app_name = ?1")
            .bind(&app.app_name)
            .execute(&mut *tx)
            .await?;

        for spec in specs {
            sqlx::query(
                "INSERT INTO app_actions
                     (app_name, position, kind, action_name, action_payload, enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            )
            .bind(&app.app_name)
            .bind(i64::from(spec.position))
            .bind(spec.kind.as_str())
            .bind(&spec.action_name)
            .bind(spec.payload.to_value().to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// All slots for an app in position order. Empty if the app is unknown.
    pub async fn load_slots(&self, app_name: &str) -> CoreResult<Vec<RingSlot>> {
        let rows: Vec<SlotRow> = sqlx::query_as(
            "SELECT id, app_name, position, kind, action_name, action_payload,
                    enabled, usage_count, last_used_at
             FROM app_actions WHERE app_name = ?1 ORDER BY position",
        )
        .bind(app_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SlotRow::into_slot).collect()
    }

    /// One slot by position.
    pub async fn get_slot(&self, app_name: &str, position: u8) -> CoreResult<Option<RingSlot>> {
        let row: Option<SlotRow> = sqlx::query_as(
            "SELECT id, app_name, position, kind, action_name, action_payload,
                    enabled, usage_count, last_used_at
             FROM app_actions WHERE app_name = ?1 AND position = ?2",
        )
        .bind(app_name)
        .bind(i64::from(position))
        .fetch_optional(&self.pool)
        .await?;

        row.map(SlotRow::into_slot).transpose()
    }

    /// Replace a single position with a new spec, resetting its usage.
    pub async fn update_slot(
        &self,
        app_name: &str,
        position: u8,
        spec: &ActionSpec,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE app_actions
             SET kind = ?1, action_name = ?2, action_payload = ?3,
                 enabled = 1, usage_count = 0, last_used_at = NULL
             WHERE app_name = ?4 AND position = ?5",
        )
        .bind(spec.kind.as_str())
        .bind(&spec.action_name)
        .bind(spec.payload.to_value().to_string())
        .bind(app_name)
        .bind(i64::from(position))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "no slot at position {position} for app {app_name}"
            )));
        }
        Ok(())
    }

    /// Atomically bump a slot's usage after a successful dispatch.
    pub async fn record_usage(&self, slot_id: i64, now: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE app_actions
             SET usage_count = usage_count + 1, last_used_at = ?1
             WHERE id = ?2",
        )
        .bind(to_unix(now))
        .bind(slot_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("slot {slot_id} not found")));
        }
        Ok(())
    }

    /// Permute slot positions without touching kind, payload, or usage.
    /// `order` maps slot id to its new position; every slot of the app must
    /// appear exactly once.
    pub async fn reorder_slots(&self, app_name: &str, order: &[(i64, u8)]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // Move everything out of the 0..7 range first so the per-slot
        // updates below cannot trip UNIQUE(app_name, position).
        sqlx::query(
            "UPDATE app_actions SET position = position + ?1 WHERE app_name = ?2",
        )
        .bind(RING_SIZE as i64)
        .bind(app_name)
        .execute(&mut *tx)
        .await?;

        for (slot_id, position) in order {
            sqlx::query("UPDATE app_actions SET position = ?1 WHERE id = ?2 AND app_name = ?3")
                .bind(i64::from(*position))
                .bind(slot_id)
                .bind(app_name)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_app(&self, app_name: &str) -> CoreResult<Option<AppRecord>> {
        let row: Option<AppRow> = sqlx::query_as(
            "SELECT app_name, display_name, tool_server_name, created_at, last_seen_at
             FROM apps WHERE app_name = ?1",
        )
        .bind(app_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AppRecord::from))
    }

    /// All known apps, most recently seen first.
    pub async fn list_apps(&self) -> CoreResult<Vec<AppRecord>> {
        let rows: Vec<AppRow> = sqlx::query_as(
            "SELECT app_name, display_name, tool_server_name, created_at, last_seen_at
             FROM apps ORDER BY last_seen_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AppRecord::from).collect())
    }

    /// Update `last_seen_at` on a foreground entry.
    pub async fn touch_last_seen(&self, app_name: &str, now: DateTime<Utc>) -> CoreResult<()> {
        sqlx::query("UPDATE apps SET last_seen_at = ?1 WHERE app_name = ?2")
            .bind(to_unix(now))
            .bind(app_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Explicit user delete. Slots and captured interactions go with the
    /// record through `ON DELETE CASCADE`.
    pub async fn delete_app(&self, app_name: &str) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM apps WHERE app_name = ?1")
            .bind(app_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::default_action_specs;
    use crate::infrastructure::database::StoreHandle;

    async fn repo() -> AppRepository {
        let store = StoreHandle::new("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        AppRepository::new(store.pool().clone())
    }

    #[tokio::test]
    async fn save_and_load_eight_slots() {
        let repo = repo().await;
        let app = AppRecord::new("notes", "Notes", None);
        repo.save_app_with_slots(&app, &default_action_specs())
            .await
            .unwrap();

        let slots = repo.load_slots("notes").await.unwrap();
        assert_eq!(slots.len(), RING_SIZE);
        let positions: Vec<u8> = slots.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert!(slots.iter().all(|s| s.usage_count == 0));
    }

    #[tokio::test]
    async fn save_twice_resets_usage() {
        let repo = repo().await;
        let app = AppRecord::new("notes", "Notes", None);
        let specs = default_action_specs();
        repo.save_app_with_slots(&app, &specs).await.unwrap();

        let slot = repo.get_slot("notes", 0).await.unwrap().unwrap();
        repo.record_usage(slot.id, Utc::now()).await.unwrap();
        assert_eq!(
            repo.get_slot("notes", 0).await.unwrap().unwrap().usage_count,
            1
        );

        repo.save_app_with_slots(&app, &specs).await.unwrap();
        assert_eq!(
            repo.get_slot("notes", 0).await.unwrap().unwrap().usage_count,
            0
        );
    }

    #[tokio::test]
    async fn record_usage_bumps_count_and_timestamp() {
        let repo = repo().await;
        let app = AppRecord::new("notes", "Notes", None);
        repo.save_app_with_slots(&app, &default_action_specs())
            .await
            .unwrap();

        let slot = repo.get_slot("notes", 3).await.unwrap().unwrap();
        assert!(slot.last_used_at.is_none());

        let now = Utc::now();
        repo.record_usage(slot.id, now).await.unwrap();

        let updated = repo.get_slot("notes", 3).await.unwrap().unwrap();
        assert_eq!(updated.usage_count, 1);
        assert_eq!(updated.last_used_at.unwrap().timestamp(), now.timestamp());
    }

    #[tokio::test]
    async fn reorder_permutes_positions_only() {
        let repo = repo().await;
        let app = AppRecord::new("notes", "Notes", None);
        repo.save_app_with_slots(&app, &default_action_specs())
            .await
            .unwrap();

        let slots = repo.load_slots("notes").await.unwrap();
        // Reverse the ring.
        let order: Vec<(i64, u8)> = slots
            .iter()
            .map(|s| (s.id, (RING_SIZE as u8 - 1) - s.position))
            .collect();
        repo.reorder_slots("notes", &order).await.unwrap();

        let reordered = repo.load_slots("notes").await.unwrap();
        assert_eq!(reordered.len(), RING_SIZE);
        assert_eq!(reordered[0].action_name, "Close");
        assert_eq!(reordered[7].action_name, "Copy");
        // Ids survive the permutation.
        assert_eq!(reordered[7].id, slots[0].id);
    }

    #[tokio::test]
    async fn delete_app_cascades_to_slots() {
        let repo = repo().await;
        let app = AppRecord::new("notes", "Notes", None);
        repo.save_app_with_slots(&app, &default_action_specs())
            .await
            .unwrap();

        assert!(repo.delete_app("notes").await.unwrap());
        assert!(repo.load_slots("notes").await.unwrap().is_empty());
        assert!(repo.get_app("notes").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_updates_last_seen() {
        let repo = repo().await;
        let mut app = AppRecord::new("notes", "Notes", None);
        app.last_seen_at = from_unix(1_000);
        app.created_at = from_unix(1_000);
        repo.save_app_with_slots(&app, &default_action_specs())
            .await
            .unwrap();

        let later = from_unix(2_000);
        repo.touch_last_seen("notes", later).await.unwrap();
        let record = repo.get_app("notes").await.unwrap().unwrap();
        assert_eq!(record.last_seen_at.timestamp(), 2_000);
        assert_eq!(record.created_at.timestamp(), 1_000);
    }
}
