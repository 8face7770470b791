//! Semantic workflows, their embeddings, and per-app clusters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::{CoreError, CoreResult};

/// Fixed embedding dimensionality. Vectors of any other length are rejected
/// at the validation boundary.
pub const EMBEDDING_DIM: usize = 1024;

/// A one-sentence label summarising a burst of captured interactions.
/// Immutable once written; only its embedding's cluster linkage evolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticWorkflow {
    pub id: Uuid,
    pub app_name: String,
    pub workflow_text: String,
    /// Ids of the interactions this workflow was distilled from.
    pub raw_interaction_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
}

impl SemanticWorkflow {
    pub fn new(
        app_name: &str,
        workflow_text: &str,
        raw_interaction_ids: Vec<i64>,
        confidence: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_name: app_name.to_string(),
            workflow_text: workflow_text.to_string(),
            raw_interaction_ids,
            created_at,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A workflow's vector, plus the cluster it was assigned to.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowEmbedding {
    pub id: i64,
    pub workflow_id: Uuid,
    pub app_name: String,
    pub vector: Vec<f32>,
    pub cluster_label: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowEmbedding {
    /// Create an unsaved embedding, rejecting mismatched dimensions.
    pub fn new(
        workflow_id: Uuid,
        app_name: &str,
        vector: Vec<f32>,
        created_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        validate_dimension(&vector)?;
        Ok(Self {
            id: 0,
            workflow_id,
            app_name: app_name.to_string(),
            vector,
            cluster_label: None,
            created_at,
        })
    }
}

/// Reject vectors whose length is not [`EMBEDDING_DIM`].
pub fn validate_dimension(vector: &[f32]) -> CoreResult<()> {
    if vector.len() != EMBEDDING_DIM {
        return Err(CoreError::Validation(format!(
            "embedding dimension {} does not match expected {}",
            vector.len(),
            EMBEDDING_DIM
        )));
    }
    Ok(())
}

/// A group of workflows close in embedding space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCluster {
    pub id: i64,
    pub app_name: String,
    /// Unique per app.
    pub cluster_label: i64,
    /// Text of the founding workflow.
    pub representative_text: String,
    pub workflow_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;

    #[test]
    fn confidence_is_clamped() {
        let wf = SemanticWorkflow::new("notes", "editing a draft", vec![1, 2, 3], 1.7, Utc::now());
        assert!((wf.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wrong_dimension_is_a_validation_error() {
        let err = WorkflowEmbedding::new(Uuid::new_v4(), "notes", vec![0.0; 3], Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn exact_dimension_is_accepted() {
        let emb =
            WorkflowEmbedding::new(Uuid::new_v4(), "notes", vec![0.1; EMBEDDING_DIM], Utc::now())
                .unwrap();
        assert_eq!(emb.vector.len(), EMBEDDING_DIM);
        assert!(emb.cluster_label.is_none());
    }
}
