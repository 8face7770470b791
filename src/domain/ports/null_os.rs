//! Null OS collaborators for headless runs and tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::error::CoreResult;
use crate::domain::ports::foreground::{ForegroundApp, ForegroundProbe};
use crate::domain::ports::input::{InputInjector, VkCode};

/// Foreground probe that never sees a focused app.
#[derive(Debug, Default)]
pub struct NullForegroundProbe;

#[async_trait]
impl ForegroundProbe for NullForegroundProbe {
    async fn foreground_app(&self) -> CoreResult<Option<ForegroundApp>> {
        Ok(None)
    }
}

/// Injector that logs the chord instead of sending it.
#[derive(Debug, Default)]
pub struct NullInputInjector;

#[async_trait]
impl InputInjector for NullInputInjector {
    async fn send_keystroke_sequence(&self, codes: &[VkCode], hold: Duration) -> CoreResult<()> {
        tracing::debug!(
            codes = ?codes.iter().map(|c| c.0).collect::<Vec<_>>(),
            hold_ms = hold.as_millis() as u64,
            "null injector: dropping keystroke sequence"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_probe_sees_nothing() {
        let probe = NullForegroundProbe;
        assert!(probe.foreground_app().await.unwrap().is_none());
        assert!(probe.list_ui_elements().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn null_injector_accepts_any_chord() {
        let injector = NullInputInjector;
        let codes = [VkCode(0x11), VkCode(0x43)];
        injector
            .send_keystroke_sequence(&codes, Duration::from_millis(40))
            .await
            .unwrap();
    }
}
