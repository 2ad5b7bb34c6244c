use crate::config::BridgeConfig;
use std::sync::Arc;
use std::time::Instant;
use xr_core::cache::{CacheConfig, CacheManager};
use xr_core::facade::RegistryFacade;
use xr_core::filter::FilterConfig;
use xr_core::registry_set::{FacadeContext, FacadeSet};
use xr_maven::MavenFacade;
use xr_mcp::McpFacade;
use xr_npm::NpmFacade;
use xr_oci::OciFacade;
use xr_pypi::PypiFacade;

/// Shared application state handed to every request handler.
pub struct AppState {
    pub set: FacadeSet,
    pub config: BridgeConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(set: FacadeSet, config: BridgeConfig) -> Self {
        Self {
            set,
            config,
            started_at: Instant::now(),
        }
    }
}

/// Builds the enabled facades, each with its own cache manager over a
/// disjoint cache directory, and kicks off background index loads.
///
/// Must run inside the tokio runtime (index loads are spawned tasks).
pub fn build_facades(config: &BridgeConfig) -> FacadeSet {
    let mut set = FacadeSet::new();

    for name in &config.enabled {
        let facade_dir = config.cache_dir.join(name);
        let cache = Arc::new(CacheManager::new(CacheConfig {
            cache_dir: Some(facade_dir.clone()),
            timeout: config.upstream_timeout,
            ..CacheConfig::default()
        }));
        let filter_config = FilterConfig {
            deadline: config.filter_deadline,
            ..FilterConfig::default()
        };

        let facade: Arc<dyn RegistryFacade> = match name.as_str() {
            "npm" => Arc::new(NpmFacade::new(Arc::clone(&cache), xr_npm::REGISTRY_BASE)),
            "pypi" => Arc::new(PypiFacade::new(Arc::clone(&cache), xr_pypi::PYPI_BASE)),
            "maven" => Arc::new(MavenFacade::new(Arc::clone(&cache), xr_maven::SEARCH_BASE)),
            "oci" => Arc::new(OciFacade::new(Arc::clone(&cache), xr_oci::HUB_BASE)),
            "mcp" => Arc::new(McpFacade::new(Arc::clone(&cache), xr_mcp::MCP_BASE)),
            other => {
                tracing::warn!(facade = other, "unknown facade name, skipping");
                continue;
            }
        };

        let ctx = FacadeContext::new(facade, cache, filter_config);
        ctx.spawn_index_load(Some(facade_dir.join("index").join("names.snapshot")));
        set.insert(ctx);
    }

    set
}
