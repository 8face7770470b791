//! The registry resolution cascade.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::error::CoreResult;
use crate::domain::models::{normalize_app_name, ToolServerDescriptor};
use crate::domain::ports::RegistrySearch;
use crate::infrastructure::database::RegistryRepository;
use crate::infrastructure::registry::aliases::{canonical_query, name_variants};
use crate::infrastructure::registry::ranking::pick_best;

/// Resolves `app_name -> ToolServerDescriptor | None` through the cascade:
/// fresh cache, local index, primary remote, secondary remote, NOT_FOUND.
///
/// Any failure that is not a definitive "no match" counts as "this source
/// returned nothing" and the cascade continues; only after every source is
/// exhausted does the negative sentinel get persisted.
pub struct RegistryResolver {
    repo: RegistryRepository,
    primary: Option<Arc<dyn RegistrySearch>>,
    secondary: Option<Arc<dyn RegistrySearch>>,
}

impl RegistryResolver {
    pub fn new(
        repo: RegistryRepository,
        primary: Option<Arc<dyn RegistrySearch>>,
        secondary: Option<Arc<dyn RegistrySearch>>,
    ) -> Self {
        Self {
            repo,
            primary,
            secondary,
        }
    }

    /// Run the cascade for one app.
    pub async fn resolve(&self, app_name: &str) -> CoreResult<Option<ToolServerDescriptor>> {
        let app = normalize_app_name(app_name);
        let query = canonical_query(&app);
        let now = Utc::now();

        // 1. Cache, including the negative sentinel. Read errors degrade
        // to a miss so a flaky disk cannot stall the foreground flow.
        match self.repo.get_cache(&app).await {
            Ok(Some(entry)) if entry.is_fresh(now) => {
                if entry.is_negative() {
                    tracing::debug!(app = %app, "negative cache hit");
                    return Ok(None);
                }
                if let Some(descriptor) = entry.descriptor() {
                    tracing::debug!(app = %app, server = %descriptor.server_name, "cache hit");
                    return Ok(Some(descriptor));
                }
                tracing::warn!(app = %app, "corrupt cache entry, re-resolving");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(app = %app, error = %e, "cache read failed, treating as miss");
            }
        }

        // 2. Local tool index.
        match self.repo.search_local_index(&query).await {
            Ok(entries) if !entries.is_empty() => {
                let candidates: Vec<ToolServerDescriptor> =
                    entries.iter().map(|e| e.to_descriptor()).collect();
                if let Some(best) = pick_best(&query, candidates) {
                    self.cache(&app, &best).await;
                    return Ok(Some(best));
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(app = %app, error = %e, "local index query failed");
            }
        }

        // 3 & 4. Remote registries, primary then secondary.
        let variants = name_variants(&app);
        for registry in [self.primary.as_ref(), self.secondary.as_ref()]
            .into_iter()
            .flatten()
        {
            if let Some(best) = self.search_remote(registry.as_ref(), &query, &variants).await {
                self.cache(&app, &best).await;
                return Ok(Some(best));
            }
        }

        // 5. Nothing anywhere; remember that.
        if let Err(e) = self.repo.put_not_found(&app, now).await {
            tracing::warn!(app = %app, error = %e, "failed to persist negative cache entry");
        }
        tracing::debug!(app = %app, "no tool server found");
        Ok(None)
    }

    /// Query one remote registry across every name variant, aggregate the
    /// matches, and rank. Errors count as an empty result from that variant.
    async fn search_remote(
        &self,
        registry: &dyn RegistrySearch,
        query: &str,
        variants: &[String],
    ) -> Option<ToolServerDescriptor> {
        let mut aggregated: Vec<ToolServerDescriptor> = Vec::new();

        for variant in variants {
            match registry.search(variant).await {
                Ok(results) => {
                    for result in results {
                        if !aggregated
                            .iter()
                            .any(|c| c.package_name == result.package_name)
                        {
                            aggregated.push(result);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        source = registry.source().as_str(),
                        variant = %variant,
                        error = %e,
                        "registry search failed, continuing"
                    );
                }
            }
        }

        pick_best(query, aggregated)
    }

    async fn cache(&self, app: &str, descriptor: &ToolServerDescriptor) {
        if let Err(e) = self.repo.put_cache(app, descriptor, Utc::now()).await {
            tracing::warn!(app = %app, error = %e, "failed to persist registry cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::CoreError;
    use crate::domain::models::{
        LocalToolIndexEntry, RegistrySource, ToolTransport, CACHE_TTL_SECS,
    };
    use crate::infrastructure::database::StoreHandle;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRegistry {
        source: RegistrySource,
        results: Vec<ToolServerDescriptor>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeRegistry {
        fn returning(source: RegistrySource, results: Vec<ToolServerDescriptor>) -> Arc<Self> {
            Arc::new(Self {
                source,
                results,
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing(source: RegistrySource) -> Arc<Self> {
            Arc::new(Self {
                source,
                results: Vec::new(),
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RegistrySearch for FakeRegistry {
        async fn search(&self, query: &str) -> CoreResult<Vec<ToolServerDescriptor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CoreError::Transport("registry unreachable".into()));
            }
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

    fn descriptor(package: &str, source: RegistrySource) -> ToolServerDescriptor {
        ToolServerDescriptor {
            server_name: package.to_string(),
            package_name: package.to_string(),
            description: String::new(),
            category: String::new(),
            source,
            validated: false,
            transport: ToolTransport::Stdio,
            invocation: format!("npx -y {package}"),
            tools: BTreeMap::new(),
        }
    }

    async fn repo() -> RegistryRepository {
        let store = StoreHandle::new("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        RegistryRepository::new(store.pool().clone())
    }

    #[tokio::test]
    async fn all_sources_empty_persists_not_found() {
        let repo = repo().await;
        let primary = FakeRegistry::returning(RegistrySource::PrimaryRegistry, vec![]);
        let secondary = FakeRegistry::returning(RegistrySource::SecondaryRegistry, vec![]);
        let resolver = RegistryResolver::new(
            repo.clone(),
            Some(primary.clone()),
            Some(secondary.clone()),
        );

        assert!(resolver.resolve("notes").await.unwrap().is_none());
        assert!(primary.call_count() > 0);
        assert!(secondary.call_count() > 0);

        let entry = repo.get_cache("notes").await.unwrap().unwrap();
        assert!(entry.is_negative());
    }

    #[tokio::test]
    async fn fresh_negative_cache_short_circuits() {
        let repo = repo().await;
        repo.put_not_found("notes", Utc::now()).await.unwrap();

        let primary = FakeRegistry::returning(RegistrySource::PrimaryRegistry, vec![]);
        let resolver = RegistryResolver::new(repo, Some(primary.clone()), None);

        assert!(resolver.resolve("notes").await.unwrap().is_none());
        assert_eq!(primary.call_count(), 0, "no network calls on a fresh sentinel");
    }

    #[tokio::test]
    async fn stale_cache_is_treated_as_absent() {
        let repo = repo().await;
        repo.put_not_found("notes", Utc::now() - chrono::Duration::seconds(CACHE_TTL_SECS + 60))
            .await
            .unwrap();

        let primary = FakeRegistry::returning(
            RegistrySource::PrimaryRegistry,
            vec![descriptor("notes", RegistrySource::PrimaryRegistry)],
        );
        let resolver = RegistryResolver::new(repo.clone(), Some(primary.clone()), None);

        let resolved = resolver.resolve("notes").await.unwrap().unwrap();
        assert_eq!(resolved.package_name, "notes");
        assert!(primary.call_count() > 0);

        // The stale sentinel was replaced with the fresh positive entry.
        let entry = repo.get_cache("notes").await.unwrap().unwrap();
        assert!(!entry.is_negative());
    }

    #[tokio::test]
    async fn local_index_wins_before_remote() {
        let repo = repo().await;
        repo.refresh_local_index(
            &[LocalToolIndexEntry {
                package_name: "notes".to_string(),
                category: String::new(),
                validated: true,
                tools_json: "{}".to_string(),
                updated_at: Utc::now(),
            }],
            Utc::now(),
        )
        .await
        .unwrap();

        let primary = FakeRegistry::returning(
            RegistrySource::PrimaryRegistry,
            vec![descriptor("notes-remote", RegistrySource::PrimaryRegistry)],
        );
        let resolver = RegistryResolver::new(repo, Some(primary.clone()), None);

        let resolved = resolver.resolve("notes").await.unwrap().unwrap();
        assert_eq!(resolved.source, RegistrySource::LocalIndex);
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn primary_failure_falls_through_to_secondary() {
        let repo = repo().await;
        let primary = FakeRegistry::failing(RegistrySource::PrimaryRegistry);
        let secondary = FakeRegistry::returning(
            RegistrySource::SecondaryRegistry,
            vec![descriptor("notes", RegistrySource::SecondaryRegistry)],
        );
        let resolver = RegistryResolver::new(repo, Some(primary), Some(secondary));

        let resolved = resolver.resolve("notes").await.unwrap().unwrap();
        assert_eq!(resolved.source, RegistrySource::SecondaryRegistry);
    }

    #[tokio::test]
    async fn exe_suffix_resolves_like_the_bare_name() {
        let repo = repo().await;
        let primary = FakeRegistry::returning(
            RegistrySource::PrimaryRegistry,
            vec![descriptor("notes", RegistrySource::PrimaryRegistry)],
        );
        let resolver = RegistryResolver::new(repo.clone(), Some(primary), None);

        let resolved = resolver.resolve("Notes.EXE").await.unwrap().unwrap();
        assert_eq!(resolved.package_name, "notes");
        // Cached under the normalised app name.
        assert!(repo.get_cache("notes.exe").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_resolve_uses_cache_not_network() {
        let repo = repo().await;
        let primary = FakeRegistry::returning(
            RegistrySource::PrimaryRegistry,
            vec![descriptor("notes", RegistrySource::PrimaryRegistry)],
        );
        let resolver = RegistryResolver::new(repo, Some(primary.clone()), None);

        resolver.resolve("notes").await.unwrap().unwrap();
        let calls_after_first = primary.call_count();
        resolver.resolve("notes").await.unwrap().unwrap();
        assert_eq!(primary.call_count(), calls_after_first);
    }
}
