//! Port for remote tool-server registries.

use async_trait::async_trait;

use crate::domain::error::CoreResult;
use crate::domain::models::{RegistrySource, ToolServerDescriptor};

/// A searchable remote catalogue of tool servers.
#[async_trait]
pub trait RegistrySearch: Send + Sync {
    /// Search for servers matching one name variant. Transport failures
    /// surface as errors; the resolver treats them as an empty result.
    async fn search(&self, query: &str) -> CoreResult<Vec<ToolServerDescriptor>>;

    /// Which cascade stage this registry represents.
    fn source(&self) -> RegistrySource;
}
