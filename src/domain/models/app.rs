//! Application records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked desktop application.
///
/// Born on the first successful ring materialisation, updated on each
/// foreground entry, destroyed only by explicit user delete (which cascades
/// to ring slots and captured interactions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    /// Normalised (lowercase) process name; primary key.
    pub app_name: String,
    /// Human-facing name shown on the ring surface.
    pub display_name: String,
    /// Resolved tool server, if any.
    pub tool_server_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl AppRecord {
    pub fn new(app_name: &str, display_name: &str, tool_server_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            app_name: normalize_app_name(app_name),
            display_name: display_name.to_string(),
            tool_server_name,
            created_at: now,
            last_seen_at: now,
        }
    }
}

/// Normalise an app name at the boundary: trimmed and lowercased.
pub fn normalize_app_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}
