//! The in-memory eight-slot projection of the focused app's ring.
//!
//! The ring is a pure projection of store state with a one-way change
//! channel: subscribers learn only that "something changed" and re-read the
//! positions they care about. The scheduler is the single writer.

use std::collections::BTreeSet;

use tokio::sync::{broadcast, RwLock};

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{
    normalize_app_name, sanitize_action_name, ActionSpec, AppRecord, RingSlot, RING_SIZE,
};
use crate::infrastructure::database::AppRepository;

/// Change marker delivered to subscribers. Carries no payload; readers
/// call [`RingManager::get`] for whatever they need.
#[derive(Debug, Clone, Copy)]
pub struct RingChanged;

struct Projection {
    app: Option<String>,
    slots: [Option<RingSlot>; RING_SIZE],
}

impl Projection {
    fn empty() -> Self {
        Self {
            app: None,
            slots: std::array::from_fn(|_| None),
        }
    }
}

/// Holds the focused app's slots and notifies the ring surface on change.
pub struct RingManager {
    repo: AppRepository,
    projection: RwLock<Projection>,
    change_tx: broadcast::Sender<RingChanged>,
}

impl RingManager {
    pub fn new(repo: AppRepository) -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            repo,
            projection: RwLock::new(Projection::empty()),
            change_tx,
        }
    }

    /// Subscribe to change notifications. Events arrive in emit order.
    pub fn subscribe(&self) -> broadcast::Receiver<RingChanged> {
        self.change_tx.subscribe()
    }

    /// Project `app_name`'s slots into memory, sanitising action names on
    /// the way, and emit one change event. All-None when the app has no
    /// slots yet.
    pub async fn load(&self, app_name: &str) -> CoreResult<()> {
        let app = normalize_app_name(app_name);
        let stored = self.repo.load_slots(&app).await?;

        let mut slots: [Option<RingSlot>; RING_SIZE] = std::array::from_fn(|_| None);
        for mut slot in stored {
            slot.action_name = sanitize_action_name(&slot.action_name);
            let position = slot.position as usize;
            if position < RING_SIZE {
                slots[position] = Some(slot);
            }
        }

        {
            let mut projection = self.projection.write().await;
            projection.app = Some(app);
            projection.slots = slots;
        }
        self.emit();
        Ok(())
    }

    /// Persist a full eight-slot ring for an app: upsert the record,
    /// replace the slots, all in one store transaction. Positions must
    /// cover exactly `{0..7}`.
    ///
    /// Saving resets usage counters on every slot; reordering survives
    /// only until the next save. This is intentional.
    pub async fn save(
        &self,
        app_name: &str,
        display_name: &str,
        specs: &[ActionSpec; RING_SIZE],
        tool_server_name: Option<String>,
    ) -> CoreResult<()> {
        let positions: BTreeSet<u8> = specs.iter().map(|s| s.position).collect();
        if positions.len() != RING_SIZE || positions.iter().max() != Some(&((RING_SIZE as u8) - 1))
        {
            return Err(CoreError::Validation(
                "ring save requires positions to cover exactly 0..7".to_string(),
            ));
        }

        let record = AppRecord::new(app_name, display_name, tool_server_name);
        self.repo.save_app_with_slots(&record, specs).await
    }

    /// The projected slot at `position`, if any.
    pub async fn get(&self, position: u8) -> Option<RingSlot> {
        if position as usize >= RING_SIZE {
            return None;
        }
        self.projection.read().await.slots[position as usize].clone()
    }

    /// The app currently projected, if any.
    pub async fn focused_app(&self) -> Option<String> {
        self.projection.read().await.app.clone()
    }

    /// Replace one position of the focused app's ring and re-project it.
    pub async fn update_position(&self, position: u8, spec: &ActionSpec) -> CoreResult<()> {
        let app = self
            .focused_app()
            .await
            .ok_or_else(|| CoreError::NotFound("no app is focused".to_string()))?;
        self.repo.update_slot(&app, position, spec).await?;
        self.load(&app).await
    }

    /// Drop the projection (nothing focused) and emit a change event.
    pub async fn clear(&self) {
        {
            let mut projection = self.projection.write().await;
            *projection = Projection::empty();
        }
        self.emit();
    }

    /// Re-project `app_name` if it is the focused app. Used by the
    /// background pipeline after it permutes slot positions.
    pub async fn reload_if_focused(&self, app_name: &str) -> CoreResult<bool> {
        let app = normalize_app_name(app_name);
        if self.focused_app().await.as_deref() == Some(app.as_str()) {
            self.load(&app).await?;
            return Ok(true);
        }
        Ok(false)
    }

    fn emit(&self) {
        // Send errors just mean nobody is subscribed.
        let _ = self.change_tx.send(RingChanged);
    }
}
