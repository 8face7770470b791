//! Port for the out-of-process LLM helper.
//!
//! The helper is invoked as `helper --mode {suggest|orchestrate|analyze}`
//! and prints one JSON document per invocation on stdout. Only its call
//! contract is modelled here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::CoreResult;
use crate::domain::models::ToolServerDescriptor;

/// One suggested ring action, as emitted by `--mode suggest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub position: u8,
    pub kind: String,
    pub action_name: String,
    pub action_payload: Value,
}

/// A tool offered to the orchestrator for selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// The orchestrator's pick, as emitted by `--mode orchestrate`.
/// `tool == "none"` means no offered tool fits the description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationChoice {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A workflow label with confidence, as emitted by `--mode analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowAnalysis {
    pub workflow: String,
    pub confidence: f64,
}

/// The LLM helper's three modes.
#[async_trait]
pub trait LlmHelper: Send + Sync {
    /// Suggest eight actions for an app, optionally informed by its tool
    /// server. The suggester validates the result and falls back on error.
    async fn suggest_actions(
        &self,
        app_name: &str,
        server: Option<&ToolServerDescriptor>,
    ) -> CoreResult<Vec<SuggestedAction>>;

    /// Pick a tool (and arguments) matching a free-text description.
    async fn choose_tool(
        &self,
        description: &str,
        tools: &[ToolSummary],
    ) -> CoreResult<OrchestrationChoice>;

    /// Summarise an interaction burst into a one-sentence workflow label.
    /// `None` when the model declines.
    async fn analyze_workflow(
        &self,
        app_name: &str,
        interaction_summary: &str,
    ) -> CoreResult<Option<WorkflowAnalysis>>;
}
