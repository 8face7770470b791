//! Captured UI interaction events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Interactions live for fifteen minutes, then the sweep removes them.
pub const INTERACTION_TTL_SECS: i64 = 900;

/// One captured UI interaction, the raw input to the workflow pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: i64,
    pub app_name: String,
    pub window_title: Option<String>,
    /// e.g. `app_focus`, `click`, `type`.
    pub interaction_type: String,
    pub element_name: Option<String>,
    pub simplified_description: String,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl InteractionEvent {
    /// Create an unsaved event (`id = 0`) expiring one TTL after `timestamp`.
    pub fn new(
        app_name: &str,
        window_title: Option<String>,
        interaction_type: &str,
        element_name: Option<String>,
        simplified_description: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            app_name: app_name.to_string(),
            window_title,
            interaction_type: interaction_type.to_string(),
            element_name,
            simplified_description: simplified_description.to_string(),
            timestamp,
            expires_at: timestamp + Duration::seconds(INTERACTION_TTL_SECS),
        }
    }
}
