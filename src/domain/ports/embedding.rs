//! Port for the embedding helper.

use async_trait::async_trait;

use crate::domain::error::CoreResult;
use crate::domain::models::EMBEDDING_DIM;

/// Turns workflow text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed one text. Implementations must return exactly
    /// [`dimension`](Self::dimension) floats or a `Validation` error.
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}
