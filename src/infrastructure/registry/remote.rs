//! HTTP client for remote tool-server registries.
//!
//! Both remote registries answer `GET {base}?q={query}` with a JSON body
//! of `{ "servers": [...], "metadata": ... }`. Unreachable endpoints and
//! non-2xx statuses surface as `Transport` errors; the resolver downgrades
//! those to "nothing from this source".

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::ports::RegistrySearch;
use crate::domain::models::{RegistrySource, ToolDef, ToolServerDescriptor, ToolTransport};

/// One registry endpoint.
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
    source: RegistrySource,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    servers: Vec<ServerRecord>,
    #[allow(dead_code)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ServerRecord {
    name: String,
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    validated: bool,
    #[serde(default)]
    transport: Option<String>,
    #[serde(default)]
    invocation: Option<String>,
    #[serde(default)]
    tools: BTreeMap<String, ToolDef>,
}

impl HttpRegistry {
    pub fn new(base_url: &str, source: RegistrySource, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            source,
        })
    }

    fn record_to_descriptor(&self, record: ServerRecord) -> ToolServerDescriptor {
        let package_name = record.package_name.unwrap_or_else(|| record.name.clone());
        let transport = match record.transport.as_deref() {
            Some("sse") => ToolTransport::Sse,
            _ => ToolTransport::Stdio,
        };
        let invocation = record
            .invocation
            .unwrap_or_else(|| format!("npx -y {package_name}"));
        ToolServerDescriptor {
            server_name: record.name,
            package_name,
            description: record.description,
            category: record.category,
            source: self.source,
            validated: record.validated,
            transport,
            invocation,
            tools: record.tools,
        }
    }
}

#[async_trait]
impl RegistrySearch for HttpRegistry {
    async fn search(&self, query: &str) -> CoreResult<Vec<ToolServerDescriptor>> {
        let url = format!("{}?q={}", self.base_url, query);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Timeout(format!("registry search for {query}"))
                } else {
                    CoreError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(CoreError::Transport(format!(
                "registry returned {} for {query}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Protocol(format!("malformed registry response: {e}")))?;

        tracing::debug!(
            query,
            source = self.source.as_str(),
            hits = body.servers.len(),
            "registry search completed"
        );

        Ok(body
            .servers
            .into_iter()
            .map(|r| self.record_to_descriptor(r))
            .collect())
    }

    fn source(&self) -> RegistrySource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_servers_from_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::UrlEncoded("q".into(), "chrome".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"servers": [
                    {"name": "chrome", "validated": true,
                     "tools": {"open_tab": {"description": "Open a tab"}}}
                ]}"#,
            )
            .create_async()
            .await;

        let registry = HttpRegistry::new(
            &format!("{}/search", server.url()),
            RegistrySource::PrimaryRegistry,
            Duration::from_secs(10),
        )
        .unwrap();

        let results = registry.search("chrome").await.unwrap();
        mock.assert_async().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].server_name, "chrome");
        assert!(results[0].validated);
        assert_eq!(results[0].source, RegistrySource::PrimaryRegistry);
        assert!(results[0].tools.contains_key("open_tab"));
        assert_eq!(results[0].invocation, "npx -y chrome");
    }

    #[tokio::test]
    async fn non_2xx_is_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let registry = HttpRegistry::new(
            &server.url(),
            RegistrySource::SecondaryRegistry,
            Duration::from_secs(10),
        )
        .unwrap();

        let err = registry.search("chrome").await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::Transport);
    }

    #[tokio::test]
    async fn malformed_body_is_a_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let registry = HttpRegistry::new(
            &server.url(),
            RegistrySource::PrimaryRegistry,
            Duration::from_secs(10),
        )
        .unwrap();

        let err = registry.search("chrome").await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::Protocol);
    }
}
