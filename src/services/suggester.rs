//! Action suggestion: eight specs per app, with a deterministic fallback.

use std::sync::Arc;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{
    default_action_specs, ActionKind, ActionPayload, ActionSpec, ToolServerDescriptor, RING_SIZE,
};
use crate::domain::ports::{LlmHelper, SuggestedAction};

/// Produces exactly eight action specs for an app. Suggestions are a seed,
/// not a pure function; the learning loop evolves them afterwards.
pub struct Suggester {
    helper: Option<Arc<dyn LlmHelper>>,
}

impl Suggester {
    pub fn new(helper: Option<Arc<dyn LlmHelper>>) -> Self {
        Self { helper }
    }

    /// Ask the helper for eight actions; fall back to the common editing
    /// keybinds on any validation failure. Never errors.
    pub async fn suggest(
        &self,
        app_name: &str,
        server: Option<&ToolServerDescriptor>,
    ) -> [ActionSpec; RING_SIZE] {
        let Some(helper) = &self.helper else {
            tracing::debug!(app = %app_name, "no LLM helper configured, using default actions");
            return default_action_specs();
        };

        match helper.suggest_actions(app_name, server).await {
            Ok(suggestions) => match validate_suggestions(suggestions) {
                Ok(specs) => {
                    tracing::info!(app = %app_name, "accepted suggested actions");
                    specs
                }
                Err(e) => {
                    tracing::warn!(app = %app_name, error = %e, "invalid suggestions, using defaults");
                    default_action_specs()
                }
            },
            Err(e) => {
                tracing::warn!(app = %app_name, error = %e, "suggestion failed, using defaults");
                default_action_specs()
            }
        }
    }
}

/// Check length, position coverage, and kind values; produce the specs in
/// position order.
fn validate_suggestions(suggestions: Vec<SuggestedAction>) -> CoreResult<[ActionSpec; RING_SIZE]> {
    if suggestions.len() != RING_SIZE {
        return Err(CoreError::Validation(format!(
            "expected {RING_SIZE} suggestions, got {}",
            suggestions.len()
        )));
    }

    let mut slots: [Option<ActionSpec>; RING_SIZE] = Default::default();
    for suggestion in suggestions {
        let kind: ActionKind = suggestion
            .kind
            .parse()
            .map_err(CoreError::Validation)?;
        let position = suggestion.position;
        if position as usize >= RING_SIZE {
            return Err(CoreError::Validation(format!(
                "position {position} out of range"
            )));
        }
        if slots[position as usize].is_some() {
            return Err(CoreError::Validation(format!(
                "duplicate position {position}"
            )));
        }
        slots[position as usize] = Some(ActionSpec {
            position,
            kind,
            action_name: suggestion.action_name,
            payload: ActionPayload::from_value(kind, suggestion.action_payload),
        });
    }

    let specs: Vec<ActionSpec> = slots.into_iter().flatten().collect();
    specs
        .try_into()
        .map_err(|_| CoreError::Validation("positions do not cover 0..7".to_string()))
}
