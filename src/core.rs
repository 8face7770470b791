//! The `Core` value: every component, wired once, handed into each
//! handler. No global mutable state; the pool's shutdown is owned here.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{Config, LocalToolIndexEntry, RegistrySource};
use crate::domain::ports::{EmbeddingClient, ForegroundProbe, InputInjector, LlmHelper};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::database::{
    AppRepository, InteractionRepository, RegistryRepository, StoreHandle, WorkflowRepository,
};
use crate::infrastructure::helpers::{HttpEmbeddingClient, LlmHelperProcess};
use crate::infrastructure::mcp::{PoolTimeouts, ToolClientPool};
use crate::infrastructure::registry::{HttpRegistry, RegistryResolver};
use crate::services::{
    DispatchOutcome, Dispatcher, RingManager, Scheduler, Suggester, WorkflowPipeline,
};

/// Row shape of the static local-index JSON file.
#[derive(Debug, Deserialize)]
struct LocalIndexFileEntry {
    package_name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    validated: bool,
    #[serde(default)]
    tools: serde_json::Value,
}

/// The composed core. Owns the store, the tool pool, and the scheduler.
pub struct Core {
    store: StoreHandle,
    apps: AppRepository,
    ring: Arc<RingManager>,
    dispatcher: Arc<Dispatcher>,
    pool: Arc<ToolClientPool>,
    scheduler: Arc<Scheduler>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Core {
    /// Wire every component from config. The OS collaborators come in as
    /// ports so hosts (and tests) choose the integration.
    pub async fn bootstrap(
        config: Config,
        probe: Arc<dyn ForegroundProbe>,
        injector: Arc<dyn InputInjector>,
    ) -> CoreResult<Self> {
        // Store.
        let db_path = ConfigLoader::database_path(&config);
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::Internal(format!("creating {}: {e}", parent.display())))?;
        }
        let store = StoreHandle::new(&format!("sqlite:{}", db_path.display())).await?;
        store.migrate().await?;
        tracing::info!(path = %db_path.display(), "store ready");

        let apps = AppRepository::new(store.pool().clone());
        let registry_repo = RegistryRepository::new(store.pool().clone());
        let interactions = InteractionRepository::new(store.pool().clone());
        let workflows = WorkflowRepository::new(store.pool().clone());

        // Optional features gate on their credentials.
        let helper: Option<Arc<dyn LlmHelper>> =
            match std::env::var(&config.helper.api_key_env) {
                Ok(_) => Some(Arc::new(LlmHelperProcess::new(
                    &config.helper.program,
                    Duration::from_secs(config.helper.timeout_secs),
                ))),
                Err(_) => {
                    tracing::warn!(
                        env = %config.helper.api_key_env,
                        "credential not set, LLM-backed suggestion and analysis disabled"
                    );
                    None
                }
            };

        let embedder: Option<Arc<dyn EmbeddingClient>> = if config.embedding.endpoint_url.is_empty()
        {
            tracing::warn!("no embedding endpoint configured, clustering disabled");
            None
        } else {
            match std::env::var(&config.embedding.api_key_env) {
                Ok(key) => Some(Arc::new(HttpEmbeddingClient::new(
                    &config.embedding.endpoint_url,
                    Some(key),
                    Duration::from_secs(config.embedding.timeout_secs),
                )?)),
                Err(_) => {
                    tracing::warn!(
                        env = %config.embedding.api_key_env,
                        "credential not set, embedding and clustering disabled"
                    );
                    None
                }
            }
        };

        // Registry cascade.
        let registry_timeout = Duration::from_secs(config.registry.request_timeout_secs);
        let primary = build_registry(
            &config.registry.primary_url,
            RegistrySource::PrimaryRegistry,
            registry_timeout,
        )?;
        let secondary = build_registry(
            &config.registry.secondary_url,
            RegistrySource::SecondaryRegistry,
            registry_timeout,
        )?;
        let resolver = Arc::new(RegistryResolver::new(
            registry_repo.clone(),
            primary,
            secondary,
        ));

        if let Some(index_path) = &config.registry.local_index_path {
            refresh_local_index_from_file(&registry_repo, index_path).await;
        }

        // Ring, dispatch, learning loop.
        let pool = Arc::new(ToolClientPool::new(PoolTimeouts::default()));
        let ring = Arc::new(RingManager::new(apps.clone()));
        let suggester = Arc::new(Suggester::new(helper.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            apps.clone(),
            registry_repo,
            pool.clone(),
            injector,
            helper.clone(),
            &config.dispatcher.interpreter,
            Duration::from_millis(config.dispatcher.key_hold_ms),
        ));
        let pipeline = Arc::new(WorkflowPipeline::new(
            interactions.clone(),
            workflows,
            apps.clone(),
            ring.clone(),
            helper,
            embedder,
            config.clustering.clone(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            probe,
            resolver,
            suggester,
            ring.clone(),
            apps.clone(),
            interactions,
            pipeline,
            config.scheduler.clone(),
        ));

        Ok(Self {
            store,
            apps,
            ring,
            dispatcher,
            pool,
            scheduler,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Start the scheduler loops.
    pub async fn start(&self) {
        let handles = self.scheduler.start();
        *self.handles.lock().await = handles;
    }

    /// A click on one ring position. The dispatch runs off this task; an
    /// empty or unknown position is a logged no-op.
    pub async fn handle_click(&self, position: u8) -> Option<JoinHandle<DispatchOutcome>> {
        match self.ring.get(position).await {
            Some(slot) => Some(self.dispatcher.spawn_dispatch(slot)),
            None => {
                tracing::debug!(position, "click on empty ring position");
                None
            }
        }
    }

    pub fn ring(&self) -> &Arc<RingManager> {
        &self.ring
    }

    pub fn apps(&self) -> &AppRepository {
        &self.apps
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Orderly shutdown: stop timers (bounded), reap every tool process,
    /// close the store.
    pub async fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().await);
        self.scheduler.stop(handles).await;
        self.pool.shutdown().await;
        self.store.close().await;
        tracing::info!("core shut down");
    }
}

fn build_registry(
    url: &str,
    source: RegistrySource,
    timeout: Duration,
) -> CoreResult<Option<Arc<dyn crate::domain::ports::RegistrySearch>>> {
    if url.is_empty() {
        return Ok(None);
    }
    Ok(Some(Arc::new(HttpRegistry::new(url, source, timeout)?)))
}

/// Bulk-refresh the local tool index from the configured JSON file.
/// Best-effort; a bad file leaves the previous index in place.
async fn refresh_local_index_from_file(repo: &RegistryRepository, path: &str) {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path, error = %e, "could not read local tool index");
            return;
        }
    };
    let entries: Vec<LocalIndexFileEntry> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path, error = %e, "could not parse local tool index");
            return;
        }
    };
    let now = chrono::Utc::now();
    let rows: Vec<LocalToolIndexEntry> = entries
        .into_iter()
        .map(|e| LocalToolIndexEntry {
            package_name: e.package_name,
            category: e.category,
            validated: e.validated,
            tools_json: e.tools.to_string(),
            updated_at: now,
        })
        .collect();
    if let Err(e) = repo.refresh_local_index(&rows, now).await {
        tracing::warn!(path, error = %e, "local tool index refresh failed");
    }
}
