//! Foreground-window observation port (OS collaborator).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::CoreResult;

/// What the OS reports about the foreground window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundApp {
    pub process_name: String,
    pub window_title: Option<String>,
    pub pid: u32,
}

/// A UI element of the focused window, as far as the OS exposes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiElement {
    pub name: String,
    pub role: String,
}

/// Observes which application the user is foregrounding.
#[async_trait]
pub trait ForegroundProbe: Send + Sync {
    /// The current foreground app, or `None` when nothing is focused
    /// (lock screen, desktop).
    async fn foreground_app(&self) -> CoreResult<Option<ForegroundApp>>;

    /// UI elements of the focused window. Optional; only interaction
    /// capture consumes it, so the default is empty.
    async fn list_ui_elements(&self) -> CoreResult<Vec<UiElement>> {
        Ok(Vec::new())
    }
}
