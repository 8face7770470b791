//! The behavioural learning loop: interactions -> semantic workflows ->
//! embeddings -> clusters -> ring re-ranking.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::domain::error::CoreResult;
use crate::domain::models::{
    ClusteringConfig, InteractionEvent, SemanticWorkflow, WorkflowEmbedding,
};
use crate::domain::ports::{EmbeddingClient, LlmHelper};
use crate::infrastructure::database::{
    AppRepository, InteractionRepository, WorkflowRepository,
};
use crate::services::clustering::{assign_cluster, rank_slots};
use crate::services::ring_manager::RingManager;

/// Periodic processor behind the scheduler's workflow timer. Per-app
/// failures are isolated; one app never blocks another.
pub struct WorkflowPipeline {
    interactions: InteractionRepository,
    workflows: WorkflowRepository,
    apps: AppRepository,
    ring: Arc<RingManager>,
    helper: Option<Arc<dyn LlmHelper>>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    config: ClusteringConfig,
}

impl WorkflowPipeline {
    pub fn new(
        interactions: InteractionRepository,
        workflows: WorkflowRepository,
        apps: AppRepository,
        ring: Arc<RingManager>,
        helper: Option<Arc<dyn LlmHelper>>,
        embedder: Option<Arc<dyn EmbeddingClient>>,
        config: ClusteringConfig,
    ) -> Self {
        Self {
            interactions,
            workflows,
            apps,
            ring,
            helper,
            embedder,
            config,
        }
    }

    /// One full pipeline pass: summarise busy apps into workflows, then
    /// re-rank every ring from accumulated usage.
    pub async fn run_once(&self) {
        let now = Utc::now();
        let since = now - Duration::seconds(self.config.recent_window_secs);

        match self
            .interactions
            .apps_with_recent(self.config.min_interactions, since)
            .await
        {
            Ok(busy_apps) => {
                for app in busy_apps {
                    if let Err(e) = self.process_app(&app).await {
                        tracing::warn!(app = %app, error = %e, "workflow processing failed");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not list apps with recent interactions");
            }
        }

        self.rerank_all().await;
    }

    /// Distill one app's recent interactions into a workflow, embed it,
    /// and assign it to a cluster.
    async fn process_app(&self, app_name: &str) -> CoreResult<()> {
        let Some(helper) = &self.helper else {
            tracing::debug!("no LLM helper configured, skipping workflow analysis");
            return Ok(());
        };

        let now = Utc::now();
        let since = now - Duration::seconds(self.config.recent_window_secs);
        let events = self.interactions.recent_for_app(app_name, since).await?;
        if events.len() < self.config.min_interactions {
            return Ok(());
        }

        let summary = summarize_interactions(&events);
        let Some(analysis) = helper.analyze_workflow(app_name, &summary).await? else {
            tracing::debug!(app = %app_name, "helper declined to label the interaction burst");
            return Ok(());
        };

        let interaction_ids: Vec<i64> = events.iter().map(|e| e.id).collect();
        let workflow = SemanticWorkflow::new(
            app_name,
            &analysis.workflow,
            interaction_ids,
            analysis.confidence,
            now,
        );

        let Some(embedder) = &self.embedder else {
            self.workflows.save_workflow(&workflow).await?;
            tracing::debug!(app = %app_name, "embedding disabled, saved workflow without vector");
            return Ok(());
        };

        match embedder.embed(&workflow.workflow_text).await {
            Ok(vector) => {
                let label = assign_cluster(
                    &self.workflows,
                    app_name,
                    &workflow.workflow_text,
                    &vector,
                    self.config.epsilon,
                    now,
                )
                .await?;
                let mut embedding =
                    WorkflowEmbedding::new(workflow.id, app_name, vector, now)?;
                embedding.cluster_label = Some(label);
                self.workflows
                    .save_workflow_with_embedding(&workflow, &embedding)
                    .await?;
                tracing::info!(
                    app = %app_name,
                    workflow = %workflow.workflow_text,
                    label,
                    "workflow recorded and clustered"
                );
            }
            Err(e) => {
                tracing::warn!(app = %app_name, error = %e, "embedding failed, saving workflow only");
                self.workflows.save_workflow(&workflow).await?;
            }
        }

        Ok(())
    }

    /// Recompute the composite score per slot and permute each app's ring
    /// by descending score. Kind and payload never change; the focused
    /// app's projection is refreshed.
    async fn rerank_all(&self) {
        let apps = match self.apps.list_apps().await {
            Ok(apps) => apps,
            Err(e) => {
                tracing::warn!(error = %e, "could not list apps for re-ranking");
                return;
            }
        };

        for app in apps {
            if let Err(e) = self.rerank_app(&app.app_name).await {
                tracing::warn!(app = %app.app_name, error = %e, "re-ranking failed");
            }
        }
    }

    async fn rerank_app(&self, app_name: &str) -> CoreResult<()> {
        let slots = self.apps.load_slots(app_name).await?;
        if slots.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let order = rank_slots(&slots, now);
        let unchanged = order
            .iter()
            .all(|(id, position)| slots.iter().any(|s| s.id == *id && s.position == *position));
        if unchanged {
            return Ok(());
        }

        self.apps.reorder_slots(app_name, &order).await?;
        self.ring.reload_if_focused(app_name).await?;
        tracing::info!(app = %app_name, "ring re-ranked by usage");
        Ok(())
    }
}

/// Compact, ordered textual summary of an interaction burst, as handed to
/// the LLM helper.
fn summarize_interactions(events: &[InteractionEvent]) -> String {
    events
        .iter()
        .map(|event| {
            let mut line = format!("[{}] {}", event.interaction_type, event.simplified_description);
            if let Some(element) = &event.element_name {
                line.push_str(&format!(" ({element})"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
