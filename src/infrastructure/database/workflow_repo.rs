//! Repository for semantic workflows, embeddings, and clusters.
//!
//! Embedding vectors live in-store as little-endian f32 BLOBs; this module
//! is the seam a dedicated vector store would replace.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::workflow::validate_dimension;
use crate::domain::models::{SemanticWorkflow, WorkflowCluster, WorkflowEmbedding};
use crate::infrastructure::database::utils::{from_unix, to_unix};

/// Attempts at claiming a cluster label before giving up. Races are rare
/// (two pipeline tasks for the same app), so a handful is plenty.
const LABEL_CLAIM_ATTEMPTS: usize = 5;

/// SQLite access to `workflows`, `workflow_embeddings`, `workflow_clusters`.
#[derive(Clone)]
pub struct WorkflowRepository {
    pool: SqlitePool,
}

/// Serialize an embedding vector for BLOB storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding vector from BLOB storage.
pub fn bytes_to_embedding(bytes: &[u8]) -> CoreResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(CoreError::Validation(
            "embedding blob length is not a multiple of four".to_string(),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[derive(sqlx::FromRow)]
struct WorkflowRow {
    id: String,
    app_name: String,
    workflow_text: String,
    raw_interaction_ids: String,
    created_at: i64,
    confidence: f64,
}

impl WorkflowRow {
    fn into_workflow(self) -> CoreResult<SemanticWorkflow> {
        Ok(SemanticWorkflow {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| CoreError::Internal(format!("corrupt workflow id: {e}")))?,
            app_name: self.app_name,
            workflow_text: self.workflow_text,
            raw_interaction_ids: serde_json::from_str(&self.raw_interaction_ids)
                .unwrap_or_default(),
            created_at: from_unix(self.created_at),
            confidence: self.confidence,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ClusterRow {
    id: i64,
    app_name: String,
    cluster_label: i64,
    representative_text: String,
    workflow_count: i64,
    created_at: i64,
    updated_at: i64,
}

impl From<ClusterRow> for WorkflowCluster {
    fn from(row: ClusterRow) -> Self {
        WorkflowCluster {
            id: row.id,
            app_name: row.app_name,
            cluster_label: row.cluster_label,
            representative_text: row.representative_text,
            workflow_count: row.workflow_count,
            created_at: from_unix(row.created_at),
            updated_at: from_unix(row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct EmbeddingRow {
    id: i64,
    workflow_id: String,
    app_name: String,
    embedding: Vec<u8>,
    cluster_label: Option<i64>,
    created_at: i64,
}

impl EmbeddingRow {
    fn into_embedding(self) -> CoreResult<WorkflowEmbedding> {
        Ok(WorkflowEmbedding {
            id: self.id,
            workflow_id: Uuid::parse_str(&self.workflow_id)
                .map_err(|e| CoreError::Internal(format!("corrupt workflow id: {e}")))?,
            app_name: self.app_name,
            vector: bytes_to_embedding(&self.embedding)?,
            cluster_label: self.cluster_label,
            created_at: from_unix(self.created_at),
        })
    }
}

impl WorkflowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a workflow alone (used when embedding is disabled).
    pub async fn save_workflow(&self, workflow: &SemanticWorkflow) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO workflows
                 (id, app_name, workflow_text, raw_interaction_ids, created_at, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.app_name)
        .bind(&workflow.workflow_text)
        .bind(serde_json::to_string(&workflow.raw_interaction_ids)?)
        .bind(to_unix(workflow.created_at))
        .bind(workflow.confidence)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist a workflow and its embedding in one transaction. The vector
    /// must be exactly the expected dimension. Returns the embedding id.
    pub async fn save_workflow_with_embedding(
        &self,
        workflow: &SemanticWorkflow,
        embedding: &WorkflowEmbedding,
    ) -> CoreResult<i64> {
        validate_dimension(&embedding.vector)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO workflows
                 (id, app_name, workflow_text, raw_interaction_ids, created_at, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.app_name)
        .bind(&workflow.workflow_text)
        .bind(serde_json::to_string(&workflow.raw_interaction_ids)?)
        .bind(to_unix(workflow.created_at))
        .bind(workflow.confidence)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "INSERT INTO workflow_embeddings
                 (workflow_id, app_name, embedding, cluster_label, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(embedding.workflow_id.to_string())
        .bind(&embedding.app_name)
        .bind(embedding_to_bytes(&embedding.vector))
        .bind(embedding.cluster_label)
        .bind(to_unix(embedding.created_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    /// Delete a workflow; its embedding goes through `ON DELETE CASCADE`.
    pub async fn delete_workflow(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn workflows_for_app(&self, app_name: &str) -> CoreResult<Vec<SemanticWorkflow>> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(
            "SELECT id, app_name, workflow_text, raw_interaction_ids, created_at, confidence
             FROM workflows WHERE app_name = ?1 ORDER BY created_at",
        )
        .bind(app_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkflowRow::into_workflow).collect()
    }

    pub async fn embeddings_for_app(&self, app_name: &str) -> CoreResult<Vec<WorkflowEmbedding>> {
        let rows: Vec<EmbeddingRow> = sqlx::query_as(
            "SELECT id, workflow_id, app_name, embedding, cluster_label, created_at
             FROM workflow_embeddings WHERE app_name = ?1 ORDER BY id",
        )
        .bind(app_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EmbeddingRow::into_embedding).collect()
    }

    pub async fn clusters_for_app(&self, app_name: &str) -> CoreResult<Vec<WorkflowCluster>> {
        let rows: Vec<ClusterRow> = sqlx::query_as(
            "SELECT id, app_name, cluster_label, representative_text, workflow_count,
                    created_at, updated_at
             FROM workflow_clusters WHERE app_name = ?1 ORDER BY cluster_label",
        )
        .bind(app_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WorkflowCluster::from).collect())
    }

    /// The representative vector per cluster: the earliest embedding that
    /// joined each label.
    pub async fn representative_embeddings(
        &self,
        app_name: &str,
    ) -> CoreResult<Vec<(i64, Vec<f32>)>> {
        let rows: Vec<(i64, Vec<u8>)> = sqlx::query_as(
            "SELECT e.cluster_label, e.embedding
             FROM workflow_embeddings e
             JOIN (SELECT cluster_label, MIN(id) AS min_id
                   FROM workflow_embeddings
                   WHERE app_name = ?1 AND cluster_label IS NOT NULL
                   GROUP BY cluster_label) firsts
               ON e.id = firsts.min_id
             ORDER BY e.cluster_label",
        )
        .bind(app_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(label, blob)| Ok((label, bytes_to_embedding(&blob)?)))
            .collect()
    }

    /// Create a cluster with label `max_existing + 1`. Two pipeline tasks
    /// racing for the same label are resolved by the UNIQUE constraint:
    /// the loser re-reads the max and retries.
    pub async fn create_cluster(
        &self,
        app_name: &str,
        representative_text: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<i64> {
        for _ in 0..LABEL_CLAIM_ATTEMPTS {
            let (max_label,): (i64,) = sqlx::query_as(
                "SELECT COALESCE(MAX(cluster_label), 0) FROM workflow_clusters WHERE app_name = ?1",
            )
            .bind(app_name)
            .fetch_one(&self.pool)
            .await?;
            let label = max_label + 1;

            let inserted = sqlx::query(
                "INSERT INTO workflow_clusters
                     (app_name, cluster_label, representative_text, workflow_count,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
            )
            .bind(app_name)
            .bind(label)
            .bind(representative_text)
            .bind(to_unix(now))
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(_) => return Ok(label),
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!(app = app_name, label, "cluster label race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::Internal(format!(
            "could not claim a cluster label for {app_name}"
        )))
    }

    /// Record one more workflow joining an existing cluster.
    pub async fn join_cluster(
        &self,
        app_name: &str,
        cluster_label: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE workflow_clusters
             SET workflow_count = workflow_count + 1, updated_at = ?1
             WHERE app_name = ?2 AND cluster_label = ?3",
        )
        .bind(to_unix(now))
        .bind(app_name)
        .bind(cluster_label)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "cluster {cluster_label} for app {app_name}"
            )));
        }
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;
    use crate::domain::models::EMBEDDING_DIM;
    use crate::infrastructure::database::StoreHandle;

    async fn repo() -> WorkflowRepository {
        let store = StoreHandle::new("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        WorkflowRepository::new(store.pool().clone())
    }

    fn workflow(app: &str, text: &str) -> SemanticWorkflow {
        SemanticWorkflow::new(app, text, vec![1, 2, 3], 0.8, Utc::now())
    }

    fn embedding_for(wf: &SemanticWorkflow, fill: f32) -> WorkflowEmbedding {
        WorkflowEmbedding::new(wf.id, &wf.app_name, vec![fill; EMBEDDING_DIM], wf.created_at)
            .unwrap()
    }

    #[test]
    fn blob_round_trip() {
        let vector = vec![0.5_f32, -1.25, 3.0];
        let bytes = embedding_to_bytes(&vector);
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), vector);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let err = bytes_to_embedding(&[0, 1, 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn workflow_and_embedding_persist_together() {
        let repo = repo().await;
        let wf = workflow("notes", "drafting a letter");
        let emb = embedding_for(&wf, 0.25);

        repo.save_workflow_with_embedding(&wf, &emb).await.unwrap();

        let workflows = repo.workflows_for_app("notes").await.unwrap();
        assert_eq!(workflows.len(), 1);
        assert_eq!(workflows[0].workflow_text, "drafting a letter");
        assert_eq!(workflows[0].raw_interaction_ids, vec![1, 2, 3]);

        let embeddings = repo.embeddings_for_app("notes").await.unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].vector.len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected_before_write() {
        let repo = repo().await;
        let wf = workflow("notes", "x");
        let mut emb = embedding_for(&wf, 0.0);
        emb.vector.truncate(10);

        let err = repo
            .save_workflow_with_embedding(&wf, &emb)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(repo.workflows_for_app("notes").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_workflow_cascades_to_embedding() {
        let repo = repo().await;
        let wf = workflow("notes", "x");
        let emb = embedding_for(&wf, 0.1);
        repo.save_workflow_with_embedding(&wf, &emb).await.unwrap();

        assert!(repo.delete_workflow(wf.id).await.unwrap());
        assert!(repo.embeddings_for_app("notes").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cluster_labels_are_sequential_per_app() {
        let repo = repo().await;
        let now = Utc::now();
        assert_eq!(repo.create_cluster("notes", "a", now).await.unwrap(), 1);
        assert_eq!(repo.create_cluster("notes", "b", now).await.unwrap(), 2);
        assert_eq!(repo.create_cluster("mail", "c", now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn join_cluster_increments_count() {
        let repo = repo().await;
        let now = Utc::now();
        let label = repo.create_cluster("notes", "a", now).await.unwrap();
        repo.join_cluster("notes", label, now).await.unwrap();
        repo.join_cluster("notes", label, now).await.unwrap();

        let clusters = repo.clusters_for_app("notes").await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].workflow_count, 3);
    }

    #[tokio::test]
    async fn join_missing_cluster_is_not_found() {
        let repo = repo().await;
        let err = repo.join_cluster("notes", 9, Utc::now()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn representative_is_earliest_embedding_per_label() {
        let repo = repo().await;
        let wf1 = workflow("notes", "first");
        let mut emb1 = embedding_for(&wf1, 0.1);
        emb1.cluster_label = Some(1);
        repo.save_workflow_with_embedding(&wf1, &emb1).await.unwrap();

        let wf2 = workflow("notes", "second");
        let mut emb2 = embedding_for(&wf2, 0.9);
        emb2.cluster_label = Some(1);
        repo.save_workflow_with_embedding(&wf2, &emb2).await.unwrap();

        let reps = repo.representative_embeddings("notes").await.unwrap();
        assert_eq!(reps.len(), 1);
        assert_eq!(reps[0].0, 1);
        assert!((reps[0].1[0] - 0.1).abs() < f32::EPSILON);
    }
}
