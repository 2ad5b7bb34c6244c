//! The MCP facade: registry server entries as resources, published
//! versions as the version map.

use crate::registry::McpClient;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::sync::Arc;
use xr_core::cache::{CacheManager, CacheStats};
use xr_core::error::Result;
use xr_core::facade::{PackageVersion, RegistryFacade, UpstreamPackage};

pub const DEFAULT_SERVERS_ESTIMATE: u64 = 5_000;

pub struct McpFacade {
    client: McpClient,
    cache: Arc<CacheManager>,
    estimate: u64,
}

impl McpFacade {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        Self {
            client: McpClient::new(Arc::clone(&cache), base),
            cache,
            estimate: DEFAULT_SERVERS_ESTIMATE,
        }
    }

    pub fn with_estimate(mut self, estimate: u64) -> Self {
        self.estimate = estimate;
        self
    }
}

#[async_trait]
impl RegistryFacade for McpFacade {
    fn group_type(&self) -> &'static str {
        "mcpproviders"
    }

    fn group_singular(&self) -> &'static str {
        "mcpprovider"
    }

    fn group_id(&self) -> &str {
        "mcp.io"
    }

    fn resource_plural(&self) -> &'static str {
        "servers"
    }

    fn resource_singular(&self) -> &'static str {
        "server"
    }

    fn upstream_origin(&self) -> &str {
        self.client.base()
    }

    fn package_count_estimate(&self) -> u64 {
        self.estimate
    }

    fn normalize(&self, name: &str) -> String {
        name.to_lowercase()
    }

    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }

    async fn package(&self, name: &str) -> Result<Arc<UpstreamPackage>> {
        let entries = self.client.server_versions(name).await?;
        Ok(Arc::new(self.project(name, &entries)))
    }

    async fn search_names(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let names = self.client.list_names().await?;
        let query = query.to_lowercase();
        Ok(names
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&query))
            .take(limit)
            .collect())
    }

    async fn corpus_names(&self) -> Result<Vec<String>> {
        self.client.list_names().await
    }

    fn model(&self) -> Value {
        json!({
            "plural": "mcpproviders",
            "singular": "mcpprovider",
            "description": "Model Context Protocol server registries",
            "resources": {
                "servers": {
                    "plural": "servers",
                    "singular": "server",
                    "hasdocument": false,
                    "setversionid": false,
                    "maxversions": 0
                }
            }
        })
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl McpFacade {
    fn project(&self, requested: &str, entries: &[Value]) -> UpstreamPackage {
        let name = entries
            .first()
            .and_then(|e| e.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(requested)
            .to_string();

        let mut versions: Vec<(PackageVersion, Option<String>, bool)> = entries
            .iter()
            .filter_map(|entry| {
                let version = entry
                    .pointer("/version_detail/version")
                    .and_then(Value::as_str)
                    .or_else(|| entry.get("version").and_then(Value::as_str))?;
                let released = entry
                    .pointer("/version_detail/release_date")
                    .and_then(Value::as_str)
                    .map(ToString::to_string);
                let is_latest = entry
                    .pointer("/version_detail/is_latest")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);

                let mut attributes = Map::new();
                attributes.insert("version".into(), json!(version));
                if let Some(released) = &released {
                    attributes.insert("published".into(), json!(released));
                }
                if let Some(description) = entry.get("description").and_then(Value::as_str) {
                    attributes.insert("description".into(), json!(description));
                }
                if let Some(packages) = entry.get("packages").and_then(Value::as_array) {
                    attributes.insert("packages".into(), json!(packages));
                }

                Some((
                    PackageVersion {
                        version: version.to_string(),
                        attributes,
                    },
                    released,
                    is_latest,
                ))
            })
            .collect();

        versions.sort_by(|(a, ta, _), (b, tb, _)| match (ta, tb) {
            (Some(ta), Some(tb)) => ta.cmp(tb),
            _ => a.version.cmp(&b.version),
        });

        let default_version = versions
            .iter()
            .find(|(_, _, is_latest)| *is_latest)
            .or_else(|| versions.last())
            .map(|(v, _, _)| v.version.clone());
        let versions: Vec<PackageVersion> = versions.into_iter().map(|(v, _, _)| v).collect();

        let mut attributes = Map::new();
        if let Some(first) = entries.first() {
            if let Some(description) = first.get("description").and_then(Value::as_str) {
                attributes.insert("description".into(), json!(description));
            }
            if let Some(repository) = first
                .pointer("/repository/url")
                .and_then(Value::as_str)
            {
                attributes.insert("repository".into(), json!(repository));
            }
        }

        UpstreamPackage {
            resource_id: self.normalize(&name),
            name,
            default_version,
            versions,
            attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MCP_BASE;
    use xr_core::cache::CacheConfig;

    fn facade() -> McpFacade {
        McpFacade::new(Arc::new(CacheManager::new(CacheConfig::default())), MCP_BASE)
    }

    fn fetch_entries() -> Vec<Value> {
        vec![
            json!({
                "name": "io.github.example/fetch",
                "description": "Fetches web content",
                "repository": {"url": "https://github.com/example/fetch", "source": "github"},
                "version_detail": {"version": "1.1.0", "release_date": "2025-02-01T00:00:00Z", "is_latest": true},
                "packages": [{"registry_name": "npm", "name": "@example/fetch"}]
            }),
            json!({
                "name": "io.github.example/fetch",
                "version_detail": {"version": "1.0.0", "release_date": "2024-11-15T00:00:00Z", "is_latest": false}
            }),
        ]
    }

    #[test]
    fn test_projection_orders_by_release_date() {
        let f = facade();
        let pkg = f.project("io.github.example/fetch", &fetch_entries());

        let order: Vec<&str> = pkg.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(order, vec!["1.0.0", "1.1.0"]);
        assert_eq!(pkg.default_version.as_deref(), Some("1.1.0"));
    }

    #[test]
    fn test_is_latest_overrides_recency() {
        let f = facade();
        let entries = vec![
            json!({"name": "a/s", "version_detail": {"version": "2.0.0-beta", "release_date": "2025-03-01T00:00:00Z", "is_latest": false}}),
            json!({"name": "a/s", "version_detail": {"version": "1.9.0", "release_date": "2025-01-01T00:00:00Z", "is_latest": true}}),
        ];
        let pkg = f.project("a/s", &entries);
        assert_eq!(pkg.default_version.as_deref(), Some("1.9.0"));
    }

    #[test]
    fn test_projection_attributes() {
        let f = facade();
        let pkg = f.project("io.github.example/fetch", &fetch_entries());

        assert_eq!(pkg.attr_str("description"), Some("Fetches web content"));
        assert_eq!(
            pkg.attr_str("repository"),
            Some("https://github.com/example/fetch")
        );

        let latest = pkg.version("1.1.0").unwrap();
        assert!(latest.attributes.contains_key("packages"));
    }

    #[test]
    fn test_empty_entries() {
        let f = facade();
        let pkg = f.project("ghost/server", &[]);
        assert!(pkg.versions.is_empty());
        assert!(pkg.default_version.is_none());
        assert_eq!(pkg.name, "ghost/server");
    }
}
