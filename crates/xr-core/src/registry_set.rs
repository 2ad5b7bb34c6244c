use crate::cache::CacheManager;
use crate::entity::EntityStore;
use crate::facade::RegistryFacade;
use crate::filter::{FilterConfig, FilterEngine};
use crate::index::NameIndex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the request path needs for one facade: the ecosystem
/// implementation plus its name index, filter engine, entity store and
/// cache handle.
///
/// Each context is self-contained — facades sharing a process must not
/// share cache directories, indices or entity state.
pub struct FacadeContext {
    pub facade: Arc<dyn RegistryFacade>,
    pub cache: Arc<CacheManager>,
    pub index: Arc<NameIndex>,
    pub filter: Arc<FilterEngine>,
    pub entities: Arc<EntityStore>,
}

impl FacadeContext {
    pub fn new(
        facade: Arc<dyn RegistryFacade>,
        cache: Arc<CacheManager>,
        filter_config: FilterConfig,
    ) -> Arc<Self> {
        let index = Arc::new(NameIndex::new());
        let filter = Arc::new(FilterEngine::new(Arc::clone(&index), filter_config));
        Arc::new(Self {
            facade,
            cache,
            index,
            filter,
            entities: Arc::new(EntityStore::new()),
        })
    }

    /// Kicks off background index construction: a snapshot file when
    /// present, the facade's corpus otherwise. Serving is never blocked;
    /// the index simply stays not-ready until one source succeeds.
    pub fn spawn_index_load(self: &Arc<Self>, snapshot_path: Option<PathBuf>) {
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(path) = snapshot_path {
                if let Some(names) = NameIndex::load_snapshot_file(&path).await {
                    if !names.is_empty() {
                        ctx.index.install(names);
                        return;
                    }
                }
            }

            match ctx.facade.corpus_names().await {
                Ok(names) if !names.is_empty() => ctx.index.install(names),
                Ok(_) => {
                    tracing::info!(
                        group = ctx.facade.group_type(),
                        "no name corpus available, serving via upstream search"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        group = ctx.facade.group_type(),
                        error = %err,
                        "name corpus load failed"
                    );
                }
            }
        });
    }
}

/// Group-plural to facade dispatch table, plus bridge-level entity
/// state for the registry root document.
#[derive(Default)]
pub struct FacadeSet {
    by_group: HashMap<&'static str, Arc<FacadeContext>>,
    ordered: Vec<&'static str>,
    pub root_entities: EntityStore,
}

impl FacadeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ctx: Arc<FacadeContext>) {
        let group = ctx.facade.group_type();
        if self.by_group.insert(group, ctx).is_none() {
            self.ordered.push(group);
        }
    }

    pub fn get(&self, group_plural: &str) -> Option<&Arc<FacadeContext>> {
        self.by_group.get(group_plural)
    }

    /// Contexts in registration order, for stable document shaping.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FacadeContext>> {
        self.ordered.iter().filter_map(|g| self.by_group.get(g))
    }

    pub fn len(&self) -> usize {
        self.by_group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_group.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheStats};
    use crate::error::Result;
    use crate::facade::UpstreamPackage;
    use async_trait::async_trait;
    use serde_json::Value;

    struct StubFacade {
        group: &'static str,
        corpus: Vec<String>,
    }

    #[async_trait]
    impl RegistryFacade for StubFacade {
        fn group_type(&self) -> &'static str {
            self.group
        }
        fn group_singular(&self) -> &'static str {
            "stubregistry"
        }
        fn group_id(&self) -> &str {
            "stub.example"
        }
        fn resource_plural(&self) -> &'static str {
            "packages"
        }
        fn resource_singular(&self) -> &'static str {
            "package"
        }
        fn upstream_origin(&self) -> &str {
            "https://stub.example"
        }
        fn package_count_estimate(&self) -> u64 {
            0
        }
        fn normalize(&self, name: &str) -> String {
            name.to_lowercase()
        }
        fn compare_versions(&self, a: &str, b: &str) -> std::cmp::Ordering {
            a.cmp(b)
        }
        async fn package(&self, name: &str) -> Result<Arc<UpstreamPackage>> {
            Err(crate::error::FacadeError::NotFound(name.into()))
        }
        async fn search_names(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn corpus_names(&self) -> Result<Vec<String>> {
            Ok(self.corpus.clone())
        }
        fn model(&self) -> Value {
            serde_json::json!({})
        }
        fn cache_stats(&self) -> CacheStats {
            CacheStats {
                hits: 0,
                misses: 0,
                size: 0,
                evictions: 0,
            }
        }
    }

    fn stub_ctx(group: &'static str, corpus: Vec<String>) -> Arc<FacadeContext> {
        FacadeContext::new(
            Arc::new(StubFacade { group, corpus }),
            Arc::new(CacheManager::new(CacheConfig::default())),
            FilterConfig::default(),
        )
    }

    #[test]
    fn test_dispatch_by_group_plural() {
        let mut set = FacadeSet::new();
        set.insert(stub_ctx("noderegistries", vec![]));
        set.insert(stub_ctx("pythonregistries", vec![]));

        assert_eq!(set.len(), 2);
        assert!(set.get("noderegistries").is_some());
        assert!(set.get("mavenregistries").is_none());
    }

    #[test]
    fn test_iteration_preserves_registration_order() {
        let mut set = FacadeSet::new();
        set.insert(stub_ctx("noderegistries", vec![]));
        set.insert(stub_ctx("pythonregistries", vec![]));

        let groups: Vec<&str> = set.iter().map(|c| c.facade.group_type()).collect();
        assert_eq!(groups, vec!["noderegistries", "pythonregistries"]);
    }

    #[tokio::test]
    async fn test_index_load_from_corpus() {
        let ctx = stub_ctx("noderegistries", vec!["react".into(), "axios".into()]);
        ctx.spawn_index_load(None);

        assert!(ctx.index.await_ready(std::time::Duration::from_secs(2)).await);
        assert_eq!(ctx.index.len(), 2);
    }

    #[tokio::test]
    async fn test_index_load_prefers_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.snapshot");
        tokio::fs::write(&path, "from-snapshot\n").await.unwrap();

        let ctx = stub_ctx("noderegistries", vec!["from-corpus".into()]);
        ctx.spawn_index_load(Some(path));

        assert!(ctx.index.await_ready(std::time::Duration::from_secs(2)).await);
        assert_eq!(*ctx.index.snapshot(), vec!["from-snapshot"]);
    }

    #[tokio::test]
    async fn test_empty_corpus_leaves_index_not_ready() {
        let ctx = stub_ctx("noderegistries", vec![]);
        ctx.spawn_index_load(None);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!ctx.index.is_ready());
    }
}
