//! The scheduler: foreground poll loop plus the two background timers.
//!
//! All timers are cooperative. A failure anywhere aborts only the current
//! transition or tick, never a loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::domain::error::CoreResult;
use crate::domain::models::{normalize_app_name, InteractionEvent, SchedulerConfig};
use crate::domain::ports::{ForegroundApp, ForegroundProbe};
use crate::infrastructure::database::{AppRepository, InteractionRepository};
use crate::infrastructure::registry::RegistryResolver;
use crate::services::ring_manager::RingManager;
use crate::services::suggester::Suggester;
use crate::services::workflow_pipeline::WorkflowPipeline;

/// Owns the three durable timers and the app-transition logic.
pub struct Scheduler {
    probe: Arc<dyn ForegroundProbe>,
    resolver: Arc<RegistryResolver>,
    suggester: Arc<Suggester>,
    ring: Arc<RingManager>,
    apps: AppRepository,
    interactions: InteractionRepository,
    pipeline: Arc<WorkflowPipeline>,
    config: SchedulerConfig,
    last_app: Mutex<Option<String>>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        probe: Arc<dyn ForegroundProbe>,
        resolver: Arc<RegistryResolver>,
        suggester: Arc<Suggester>,
        ring: Arc<RingManager>,
        apps: AppRepository,
        interactions: InteractionRepository,
        pipeline: Arc<WorkflowPipeline>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            probe,
            resolver,
            suggester,
            ring,
            apps,
            interactions,
            pipeline,
            config,
            last_app: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the three loops. The returned handles are awaited (with a
    /// grace bound) by [`stop`](Self::stop).
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        self.running.store(true, Ordering::SeqCst);
        let mut handles = Vec::with_capacity(3);

        // Foreground poll.
        {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(Duration::from_millis(scheduler.config.foreground_poll_ms));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                while scheduler.running.load(Ordering::SeqCst) {
                    ticker.tick().await;
                    scheduler.poll_foreground_once().await;
                }
            }));
        }

        // Interaction sweep.
        {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(
                    scheduler.config.sweep_interval_secs,
                ));
                ticker.tick().await; // immediate first tick is a no-op
                while scheduler.running.load(Ordering::SeqCst) {
                    ticker.tick().await;
                    match scheduler.interactions.sweep_expired(Utc::now()).await {
                        Ok(0) => {}
                        Ok(removed) => {
                            tracing::debug!(removed, "swept expired interactions");
                        }
                        Err(e) => tracing::warn!(error = %e, "interaction sweep failed"),
                    }
                }
            }));
        }

        // Workflow pipeline: first fire after the initial delay, then on
        // the regular interval.
        {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(
                    scheduler.config.pipeline_initial_delay_secs,
                ))
                .await;
                let mut ticker = tokio::time::interval(Duration::from_secs(
                    scheduler.config.pipeline_interval_secs,
                ));
                while scheduler.running.load(Ordering::SeqCst) {
                    scheduler.pipeline.run_once().await;
                    ticker.tick().await;
                }
            }));
        }

        tracing::info!(
            poll_ms = self.config.foreground_poll_ms,
            sweep_secs = self.config.sweep_interval_secs,
            pipeline_secs = self.config.pipeline_interval_secs,
            "scheduler started"
        );
        handles
    }

    /// Signal the loops to stop, then await each handle for the grace
    /// period before aborting it.
    pub async fn stop(&self, handles: Vec<JoinHandle<()>>) {
        self.running.store(false, Ordering::SeqCst);
        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        for mut handle in handles {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                tracing::warn!("scheduler task did not stop in time, aborting");
                handle.abort();
            }
        }
        tracing::info!("scheduler stopped");
    }

    /// One poll step: read the foreground app and, if it changed, run the
    /// transition. Errors are logged and abort only this step.
    pub async fn poll_foreground_once(&self) {
        let foreground = match self.probe.foreground_app().await {
            Ok(fg) => fg,
            Err(e) => {
                tracing::warn!(error = %e, "foreground probe failed");
                return;
            }
        };

        let Some(foreground) = foreground else {
            return;
        };
        let app = normalize_app_name(&foreground.process_name);
        if app.is_empty() {
            return;
        }

        {
            let last = self.last_app.lock().await;
            if last.as_deref() == Some(app.as_str()) {
                return;
            }
        }

        match self.transition_to(&app, &foreground).await {
            Ok(()) => {
                *self.last_app.lock().await = Some(app);
            }
            Err(e) => {
                tracing::warn!(app = %app, error = %e, "app transition failed");
            }
        }
    }

    /// The app-switch hot path: load the existing ring, or run the
    /// resolve -> suggest -> save pipeline for a first encounter.
    async fn transition_to(&self, app: &str, foreground: &ForegroundApp) -> CoreResult<()> {
        tracing::debug!(app = %app, "foreground transition");

        // A store read failure here degrades to "no slots", which re-runs
        // the materialisation below rather than aborting the switch.
        let slots = match self.apps.load_slots(app).await {
            Ok(slots) => slots,
            Err(e) => {
                tracing::warn!(app = %app, error = %e, "slot read failed, re-materialising");
                Vec::new()
            }
        };

        if slots.is_empty() {
            let resolved = self.resolver.resolve(app).await?;
            let specs = self.suggester.suggest(app, resolved.as_ref()).await;
            let server_name = resolved.map(|d| d.server_name);
            self.ring
                .save(app, &display_name_for(app), &specs, server_name)
                .await?;
        } else {
            self.apps.touch_last_seen(app, Utc::now()).await?;
        }

        self.ring.load(app).await?;
        self.capture_focus_event(app, foreground).await;
        Ok(())
    }

    /// Record the focus change as an interaction event for the learning
    /// loop. Best-effort; the transition has already succeeded.
    async fn capture_focus_event(&self, app: &str, foreground: &ForegroundApp) {
        let event = InteractionEvent::new(
            app,
            foreground.window_title.clone(),
            "app_focus",
            None,
            &format!("switched to {app}"),
            Utc::now(),
        );
        if let Err(e) = self.interactions.insert(&event).await {
            tracing::debug!(app = %app, error = %e, "could not capture focus event");
        }
    }
}

/// Human-facing name derived from the process name: extension stripped,
/// first letter upper-cased.
fn display_name_for(app: &str) -> String {
    let stem = app.strip_suffix(".exe").unwrap_or(app);
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => stem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_strips_extension_and_capitalises() {
        assert_eq!(display_name_for("notes"), "Notes");
        assert_eq!(display_name_for("chrome.exe"), "Chrome");
        assert_eq!(display_name_for(""), "");
    }
}
