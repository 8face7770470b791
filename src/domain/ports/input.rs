//! Keystroke injection port (OS collaborator).

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::error::CoreResult;

/// A virtual-key code in the platform's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VkCode(pub u16);

/// Injects keystroke sequences into the focused application.
#[async_trait]
pub trait InputInjector: Send + Sync {
    /// Press `codes` in order, hold the chord for `hold`, release in
    /// reverse order.
    async fn send_keystroke_sequence(&self, codes: &[VkCode], hold: Duration) -> CoreResult<()>;
}
