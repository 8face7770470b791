//! Online workflow clustering and the composite re-ranking score.

use chrono::{DateTime, Utc};

use crate::domain::error::CoreResult;
use crate::domain::models::{RingSlot, RING_SIZE};
use crate::infrastructure::database::WorkflowRepository;

/// Recency decays to zero over thirty days.
const RECENCY_WINDOW_SECS: f64 = 30.0 * 24.0 * 3600.0;

/// Cosine similarity. Mismatched lengths and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Cosine distance: `1 - cosine_similarity`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// DBSCAN-flavoured online assignment: join the nearest existing cluster
/// if its representative is within `epsilon`, otherwise found a new one.
/// Returns the cluster label.
pub async fn assign_cluster(
    repo: &WorkflowRepository,
    app_name: &str,
    workflow_text: &str,
    vector: &[f32],
    epsilon: f32,
    now: DateTime<Utc>,
) -> CoreResult<i64> {
    let representatives = repo.representative_embeddings(app_name).await?;

    let nearest = representatives
        .iter()
        .map(|(label, rep)| (*label, cosine_distance(vector, rep)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    if let Some((label, distance)) = nearest {
        if distance < epsilon {
            repo.join_cluster(app_name, label, now).await?;
            tracing::debug!(app = %app_name, label, distance, "joined existing cluster");
            return Ok(label);
        }
    }

    let label = repo.create_cluster(app_name, workflow_text, now).await?;
    tracing::debug!(app = %app_name, label, "created new cluster");
    Ok(label)
}

/// Composite slot score: `0.6·ln(1 + usage) + 0.4·recency`, where recency
/// falls linearly from 1 to 0 over thirty days and is 0 for a slot never
/// used.
pub fn composite_score(slot: &RingSlot, now: DateTime<Utc>) -> f64 {
    let usage = (1.0 + slot.usage_count as f64).ln();
    let recency = slot.last_used_at.map_or(0.0, |used| {
        let age = now.signed_duration_since(used).num_seconds() as f64;
        (1.0 - age / RECENCY_WINDOW_SECS).max(0.0)
    });
    0.6 * usage + 0.4 * recency
}

/// Rank slots by descending composite score and assign positions `0..7`.
/// Ties keep their current relative order, so an unused ring stays put.
/// The result feeds the store's position permutation; kind and payload are
/// untouched.
pub fn rank_slots(slots: &[RingSlot], now: DateTime<Utc>) -> Vec<(i64, u8)> {
    let mut scored: Vec<(&RingSlot, f64)> = slots
        .iter()
        .map(|slot| (slot, composite_score(slot, now)))
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.position.cmp(&b.0.position))
    });
    scored
        .into_iter()
        .take(RING_SIZE)
        .enumerate()
        .map(|(position, (slot, _))| (slot.id, position as u8))
        .collect()
}
