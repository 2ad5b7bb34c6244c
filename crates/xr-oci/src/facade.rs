//! The OCI facade: Docker Hub repositories as resources, tags as
//! versions.

use crate::registry::{HubClient, qualified_name};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::sync::Arc;
use xr_core::cache::{CacheManager, CacheStats};
use xr_core::error::Result;
use xr_core::facade::{PackageVersion, RegistryFacade, UpstreamPackage};

pub const DEFAULT_IMAGES_ESTIMATE: u64 = 9_000_000;

pub struct OciFacade {
    client: HubClient,
    cache: Arc<CacheManager>,
    estimate: u64,
}

impl OciFacade {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        Self {
            client: HubClient::new(Arc::clone(&cache), base),
            cache,
            estimate: DEFAULT_IMAGES_ESTIMATE,
        }
    }

    pub fn with_estimate(mut self, estimate: u64) -> Self {
        self.estimate = estimate;
        self
    }
}

#[async_trait]
impl RegistryFacade for OciFacade {
    fn group_type(&self) -> &'static str {
        "containerregistries"
    }

    fn group_singular(&self) -> &'static str {
        "containerregistry"
    }

    fn group_id(&self) -> &str {
        "docker.io"
    }

    fn resource_plural(&self) -> &'static str {
        "images"
    }

    fn resource_singular(&self) -> &'static str {
        "image"
    }

    fn upstream_origin(&self) -> &str {
        self.client.base()
    }

    fn package_count_estimate(&self) -> u64 {
        self.estimate
    }

    /// Bare official-image names gain the `library/` namespace.
    fn normalize(&self, name: &str) -> String {
        qualified_name(&name.to_lowercase())
    }

    /// Tags are arbitrary strings; ordering is lexicographic and the
    /// chronology comes from `last_updated` timestamps instead.
    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }

    async fn package(&self, name: &str) -> Result<Arc<UpstreamPackage>> {
        let repo = self.client.repository(name).await?;
        let tags = self.client.tags(name).await.unwrap_or_default();
        Ok(Arc::new(self.project(name, &repo, &tags)))
    }

    async fn search_names(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        self.client.search(query, limit).await
    }

    fn sample_query(&self) -> &'static str {
        "nginx"
    }

    fn model(&self) -> Value {
        json!({
            "plural": "containerregistries",
            "singular": "containerregistry",
            "description": "OCI image registries",
            "resources": {
                "images": {
                    "plural": "images",
                    "singular": "image",
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

impl OciFacade {
    fn project(&self, requested: &str, repo: &Value, tags: &[Value]) -> UpstreamPackage {
        let name = qualified_name(requested);

        let mut versions: Vec<(PackageVersion, Option<String>)> = tags
            .iter()
            .filter_map(|tag| {
                let tag_name = tag.get("name").and_then(Value::as_str)?;
                let updated = tag
                    .get("last_updated")
                    .and_then(Value::as_str)
                    .map(ToString::to_string);

                let mut attributes = Map::new();
                attributes.insert("tag".into(), json!(tag_name));
                if let Some(updated) = &updated {
                    attributes.insert("published".into(), json!(updated));
                }
                if let Some(digest) = tag.get("digest").and_then(Value::as_str) {
                    attributes.insert("digest".into(), json!(digest));
                }
                if let Some(size) = tag.get("full_size").and_then(Value::as_u64) {
                    attributes.insert("size".into(), json!(size));
                }
                let architectures: Vec<&str> = tag
                    .get("images")
                    .and_then(Value::as_array)
                    .map(|images| {
                        images
                            .iter()
                            .filter_map(|i| i.get("architecture").and_then(Value::as_str))
                            .collect()
                    })
                    .unwrap_or_default();
                if !architectures.is_empty() {
                    attributes.insert("architectures".into(), json!(architectures));
                }

                Some((
                    PackageVersion {
                        version: tag_name.to_string(),
                        attributes,
                    },
                    updated,
                ))
            })
            .collect();

        versions.sort_by(|(a, ta), (b, tb)| match (ta, tb) {
            (Some(ta), Some(tb)) => ta.cmp(tb).then_with(|| a.version.cmp(&b.version)),
            _ => a.version.cmp(&b.version),
        });
        let versions: Vec<PackageVersion> = versions.into_iter().map(|(v, _)| v).collect();

        // "latest" is the conventional default tag; otherwise the most
        // recently pushed tag wins.
        let default_version = versions
            .iter()
            .find(|v| v.version == "latest")
            .or_else(|| versions.last())
            .map(|v| v.version.clone());

        let mut attributes = Map::new();
        if let Some(description) = repo.get("description").and_then(Value::as_str) {
            if !description.is_empty() {
                attributes.insert("description".into(), json!(description));
            }
        }
        if let Some(stars) = repo.get("star_count").and_then(Value::as_u64) {
            attributes.insert("stars".into(), json!(stars));
        }
        if let Some(pulls) = repo.get("pull_count").and_then(Value::as_u64) {
            attributes.insert("pulls".into(), json!(pulls));
        }

        UpstreamPackage {
            resource_id: self.normalize(requested),
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
    use crate::registry::HUB_BASE;
    use xr_core::cache::CacheConfig;

    fn facade() -> OciFacade {
        OciFacade::new(Arc::new(CacheManager::new(CacheConfig::default())), HUB_BASE)
    }

    fn nginx_tags() -> Vec<Value> {
        vec![
            json!({"name": "latest", "last_updated": "2024-03-01T10:00:00Z", "full_size": 7000,
                   "images": [{"architecture": "amd64"}, {"architecture": "arm64"}]}),
            json!({"name": "1.24", "last_updated": "2023-05-10T08:00:00Z"}),
            json!({"name": "1.25", "last_updated": "2023-11-20T09:30:00Z"}),
        ]
    }

    #[test]
    fn test_projection_orders_tags_chronologically() {
        let f = facade();
        let pkg = f.project("nginx", &json!({"description": "Web server"}), &nginx_tags());

        let order: Vec<&str> = pkg.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(order, vec!["1.24", "1.25", "latest"]);
        assert_eq!(pkg.default_version.as_deref(), Some("latest"));
    }

    #[test]
    fn test_default_without_latest_tag() {
        let f = facade();
        let tags = vec![
            json!({"name": "1.24", "last_updated": "2023-05-10T08:00:00Z"}),
            json!({"name": "1.25", "last_updated": "2023-11-20T09:30:00Z"}),
        ];
        let pkg = f.project("nginx", &json!({}), &tags);
        assert_eq!(pkg.default_version.as_deref(), Some("1.25"));
    }

    #[test]
    fn test_projection_attributes() {
        let f = facade();
        let pkg = f.project(
            "nginx",
            &json!({"description": "Web server", "star_count": 20000, "pull_count": 1000000}),
            &nginx_tags(),
        );

        assert_eq!(pkg.name, "library/nginx");
        assert_eq!(pkg.resource_id, "library/nginx");
        assert_eq!(pkg.attr_str("description"), Some("Web server"));

        let latest = pkg.version("latest").unwrap();
        assert_eq!(
            latest.attributes.get("architectures").unwrap(),
            &json!(["amd64", "arm64"])
        );
        assert_eq!(latest.attributes.get("size"), Some(&json!(7000)));
    }

    #[test]
    fn test_normalize_adds_library_namespace() {
        let f = facade();
        assert_eq!(f.normalize("Nginx"), "library/nginx");
        assert_eq!(f.normalize("grafana/grafana"), "grafana/grafana");
    }
}
