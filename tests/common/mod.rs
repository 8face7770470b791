//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use octant::domain::error::{CoreError, CoreResult};
use octant::domain::models::{RegistrySource, ToolServerDescriptor, ToolTransport};
use octant::domain::ports::{
    EmbeddingClient, ForegroundApp, ForegroundProbe, InputInjector, LlmHelper,
    OrchestrationChoice, RegistrySearch, SuggestedAction, ToolSummary, VkCode, WorkflowAnalysis,
};
use octant::infrastructure::database::{
    AppRepository, InteractionRepository, RegistryRepository, StoreHandle, WorkflowRepository,
};

/// Fresh in-memory store with the schema applied.
pub async fn memory_store() -> StoreHandle {
    let store = StoreHandle::new("sqlite::memory:")
        .await
        .expect("failed to open in-memory store");
    store.migrate().await.expect("migration failed");
    store
}

pub fn app_repo(store: &StoreHandle) -> AppRepository {
    AppRepository::new(store.pool().clone())
}

pub fn registry_repo(store: &StoreHandle) -> RegistryRepository {
    RegistryRepository::new(store.pool().clone())
}

pub fn interaction_repo(store: &StoreHandle) -> InteractionRepository {
    InteractionRepository::new(store.pool().clone())
}

pub fn workflow_repo(store: &StoreHandle) -> WorkflowRepository {
    WorkflowRepository::new(store.pool().clone())
}

pub fn descriptor(server_name: &str, invocation: &str) -> ToolServerDescriptor {
    ToolServerDescriptor {
        server_name: server_name.to_string(),
        package_name: server_name.to_string(),
        description: String::new(),
        category: String::new(),
        source: RegistrySource::PrimaryRegistry,
        validated: false,
        transport: ToolTransport::Stdio,
        invocation: invocation.to_string(),
        tools: BTreeMap::new(),
    }
}

/// Foreground probe whose reading the test scripts.
pub struct SettableProbe {
    current: Mutex<Option<ForegroundApp>>,
}

impl SettableProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(None),
        })
    }

    pub fn set(&self, process_name: &str) {
        *self.current.lock().unwrap() = Some(ForegroundApp {
            process_name: process_name.to_string(),
            window_title: Some(format!("{process_name} window")),
            pid: 4242,
        });
    }
}

#[async_trait]
impl ForegroundProbe for SettableProbe {
    async fn foreground_app(&self) -> CoreResult<Option<ForegroundApp>> {
        Ok(self.current.lock().unwrap().clone())
    }
}

/// Injector that records every chord it is asked to send.
pub struct RecordingInjector {
    pub sent: Mutex<Vec<Vec<u16>>>,
}

impl RecordingInjector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn chords(&self) -> Vec<Vec<u16>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl InputInjector for RecordingInjector {
    async fn send_keystroke_sequence(&self, codes: &[VkCode], _hold: Duration) -> CoreResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push(codes.iter().map(|c| c.0).collect());
        Ok(())
    }
}

/// Remote registry fake with a call counter.
pub struct CountingRegistry {
    source: RegistrySource,
    results: Vec<ToolServerDescriptor>,
    calls: AtomicUsize,
}

impl CountingRegistry {
    pub fn new(source: RegistrySource, results: Vec<ToolServerDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            source,
            results,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistrySearch for CountingRegistry {
    async fn search(&self, query: &str) -> CoreResult<Vec<ToolServerDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .results
            .iter()
            .filter(|d| d.package_name.contains(query))
            .cloned()
            .collect())
    }

    fn source(&self) -> RegistrySource {
        self.source
    }
}

/// LLM helper fake: canned orchestration choice plus a recorded call log.
pub struct ScriptedHelper {
    pub choice: OrchestrationChoice,
    pub offered_tools: Mutex<Vec<Vec<String>>>,
}

impl ScriptedHelper {
    pub fn choosing(tool: &str, arguments: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            choice: OrchestrationChoice {
                tool: tool.to_string(),
                arguments,
            },
            offered_tools: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmHelper for ScriptedHelper {
    async fn suggest_actions(
        &self,
        _app: &str,
        _server: Option<&ToolServerDescriptor>,
    ) -> CoreResult<Vec<SuggestedAction>> {
        Err(CoreError::Unsupported("not scripted".to_string()))
    }

    async fn choose_tool(
        &self,
        _description: &str,
        tools: &[ToolSummary],
    ) -> CoreResult<OrchestrationChoice> {
        self.offered_tools
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name.clone()).collect());
        Ok(self.choice.clone())
    }

    async fn analyze_workflow(
        &self,
        _app: &str,
        _summary: &str,
    ) -> CoreResult<Option<WorkflowAnalysis>> {
        Ok(None)
    }
}

/// Embedding fake returning a fixed vector.
pub struct FixedEmbedder {
    pub vector: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for FixedEmbedder {
    async fn embed(&self, _text: &str) -> CoreResult<Vec<f32>> {
        Ok(self.vector.clone())
    }
}
