//! Pool of connected tool-server clients, keyed by server name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::models::{ToolServerDescriptor, ToolTransport};
use crate::infrastructure::mcp::error::{McpError, Result};
use crate::infrastructure::mcp::protocol::{McpToolDef, ToolCallResult};
use crate::infrastructure::mcp::transport::StdioClient;

/// Deadlines governing the pool and its clients.
#[derive(Debug, Clone, Copy)]
pub struct PoolTimeouts {
    /// How long a freshly spawned child may take to prove it stays up.
    pub spawn_grace: Duration,
    /// Per-call JSON-RPC deadline.
    pub call_timeout: Duration,
    /// Bounded wait for a child to exit during eviction.
    pub evict_wait: Duration,
}

impl Default for PoolTimeouts {
    fn default() -> Self {
        Self {
            spawn_grace: Duration::from_millis(500),
            call_timeout: Duration::from_secs(30),
            evict_wait: Duration::from_secs(1),
        }
    }
}

/// Owns every running tool-server process. Nothing else touches their
/// pipes. Dead or failed clients are evicted so the next caller re-spawns.
pub struct ToolClientPool {
    clients: Mutex<HashMap<String, Arc<StdioClient>>>,
    timeouts: PoolTimeouts,
}

impl ToolClientPool {
    pub fn new(timeouts: PoolTimeouts) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            timeouts,
        }
    }

    /// `tools/list` against the server the descriptor names.
    pub async fn list_tools(&self, descriptor: &ToolServerDescriptor) -> Result<Vec<McpToolDef>> {
        let client = self.client_for(descriptor).await?;
        self.settle(descriptor, client.list_tools().await).await
    }

    /// `tools/call` against the server the descriptor names.
    pub async fn call_tool(
        &self,
        descriptor: &ToolServerDescriptor,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult> {
        let client = self.client_for(descriptor).await?;
        self.settle(descriptor, client.call_tool(tool, arguments).await)
            .await
    }

    /// Get a healthy, initialised client for the descriptor, reusing the
    /// pooled one when it is still alive and evicting it otherwise.
    async fn client_for(&self, descriptor: &ToolServerDescriptor) -> Result<Arc<StdioClient>> {
        if descriptor.transport == ToolTransport::Sse {
            return Err(McpError::Unsupported(format!(
                "server {} requires SSE transport",
                descriptor.server_name
            )));
        }

        let mut clients = self.clients.lock().await;

        if let Some(existing) = clients.get(&descriptor.server_name) {
            if existing.probe_alive().await && existing.is_initialized() {
                return Ok(existing.clone());
            }
            tracing::info!(server = %descriptor.server_name, "evicting dead tool server client");
            let stale = clients.remove(&descriptor.server_name);
            if let Some(stale) = stale {
                stale.close(self.timeouts.evict_wait).await;
            }
        }

        let client = Arc::new(
            StdioClient::spawn(
                &descriptor.server_name,
                &descriptor.invocation,
                self.timeouts.spawn_grace,
                self.timeouts.call_timeout,
            )
            .await?,
        );

        if let Err(e) = client.handshake().await {
            client.close(self.timeouts.evict_wait).await;
            return Err(e);
        }

        clients.insert(descriptor.server_name.clone(), client.clone());
        Ok(client)
    }

    /// Apply the eviction policy to a finished call: timeouts and protocol
    /// failures close the client; the next caller re-spawns.
    async fn settle<T>(&self, descriptor: &ToolServerDescriptor, outcome: Result<T>) -> Result<T> {
        if let Err(err) = &outcome {
            if err.should_evict() {
                tracing::warn!(
                    server = %descriptor.server_name,
                    error = %err,
                    "evicting tool server client after failure"
                );
                self.evict(&descriptor.server_name).await;
            }
        }
        outcome
    }

    /// Remove and close one client.
    pub async fn evict(&self, server_name: &str) {
        let removed = self.clients.lock().await.remove(server_name);
        if let Some(client) = removed {
            client.close(self.timeouts.evict_wait).await;
        }
    }

    /// Number of pooled clients (alive or not).
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Evict everything. Called once by the owning `Core` at shutdown; no
    /// child process outlives it.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = {
            let mut clients = self.clients.lock().await;
            clients.drain().collect()
        };
        let count = drained.len();
        futures::future::join_all(
            drained
                .into_iter()
                .map(|(_, client)| async move { client.close(self.timeouts.evict_wait).await }),
        )
        .await;
        if count > 0 {
            tracing::info!(count, "tool client pool shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RegistrySource;
    use std::collections::BTreeMap;

    fn fast_timeouts() -> PoolTimeouts {
        PoolTimeouts {
            spawn_grace: Duration::from_millis(300),
            call_timeout: Duration::from_millis(300),
            evict_wait: Duration::from_secs(1),
        }
    }

    fn descriptor(name: &str, invocation: &str) -> ToolServerDescriptor {
        ToolServerDescriptor {
            server_name: name.to_string(),
            package_name: name.to_string(),
            description: String::new(),
            category: String::new(),
            source: RegistrySource::LocalIndex,
            validated: false,
            transport: ToolTransport::Stdio,
            invocation: invocation.to_string(),
            tools: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn sse_transport_is_unsupported() {
        let pool = ToolClientPool::new(fast_timeouts());
        let mut desc = descriptor("svc", "sleep 30");
        desc.transport = ToolTransport::Sse;
        let err = pool.list_tools(&desc).await.unwrap_err();
        assert!(matches!(err, McpError::Unsupported(_)));
    }

    #[tokio::test]
    async fn failed_spawn_leaves_pool_empty() {
        let pool = ToolClientPool::new(fast_timeouts());
        let desc = descriptor("ghost", "definitely-not-a-real-binary-4821");
        assert!(pool.list_tools(&desc).await.is_err());
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn handshake_timeout_does_not_pool_the_client() {
        // `sleep` never answers `initialize`, so the handshake times out
        // and the client must not be kept.
        let pool = ToolClientPool::new(fast_timeouts());
        let desc = descriptor("mute", "sleep 30");
        let err = pool.list_tools(&desc).await.unwrap_err();
        assert!(matches!(err, McpError::Timeout));
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn shutdown_empties_the_pool() {
        let pool = ToolClientPool::new(fast_timeouts());
        pool.shutdown().await;
        assert!(pool.is_empty().await);
    }
}
