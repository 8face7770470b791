//! HTTP client for the embedding helper.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::workflow::validate_dimension;
use crate::domain::ports::EmbeddingClient;

/// POSTs workflow text to the embedding endpoint and validates the vector
/// dimension before it can reach the store.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "input": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::Timeout("embedding request".to_string())
            } else {
                CoreError::Transport(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(CoreError::Transport(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Protocol(format!("malformed embedding response: {e}")))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CoreError::Protocol("embedding response had no data".to_string()))?;

        validate_dimension(&vector)?;
        Ok(vector)
    }
}
