//! The Maven Central facade: `group:artifact` coordinates as resources,
//! solrsearch documents as versions.

use crate::registry::{MavenClient, REPOSITORY_BASE, artifact_url, split_coordinate};
use crate::version::compare_maven_versions;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::sync::Arc;
use xr_core::cache::{CacheManager, CacheStats};
use xr_core::error::Result;
use xr_core::facade::{PackageVersion, RegistryFacade, UpstreamPackage};

pub const DEFAULT_PACKAGES_ESTIMATE: u64 = 600_000;

/// Maven Central facade.
pub struct MavenFacade {
    client: MavenClient,
    cache: Arc<CacheManager>,
    repository: String,
    estimate: u64,
}

impl MavenFacade {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        Self {
            client: MavenClient::new(Arc::clone(&cache), base),
            cache,
            repository: REPOSITORY_BASE.to_string(),
            estimate: DEFAULT_PACKAGES_ESTIMATE,
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_estimate(mut self, estimate: u64) -> Self {
        self.estimate = estimate;
        self
    }
}

#[async_trait]
impl RegistryFacade for MavenFacade {
    fn group_type(&self) -> &'static str {
        "javaregistries"
    }

    fn group_singular(&self) -> &'static str {
        "javaregistry"
    }

    fn group_id(&self) -> &str {
        "central.maven.org"
    }

    fn resource_plural(&self) -> &'static str {
        "packages"
    }

    fn resource_singular(&self) -> &'static str {
        "package"
    }

    fn upstream_origin(&self) -> &str {
        self.client.base()
    }

    fn package_count_estimate(&self) -> u64 {
        self.estimate
    }

    /// Coordinates are case-insensitive on Central's search side.
    fn normalize(&self, name: &str) -> String {
        name.to_lowercase()
    }

    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        compare_maven_versions(a, b)
    }

    async fn package(&self, name: &str) -> Result<Arc<UpstreamPackage>> {
        let (group, artifact) = split_coordinate(name)?;
        let docs = self.client.version_docs(group, artifact).await?;
        Ok(Arc::new(self.project(group, artifact, &docs)))
    }

    async fn search_names(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        self.client.search(query, limit).await
    }

    fn sample_query(&self) -> &'static str {
        "guava"
    }

    fn model(&self) -> Value {
        json!({
            "plural": "javaregistries",
            "singular": "javaregistry",
            "description": "Maven artifact registries",
            "resources": {
                "packages": {
                    "plural": "packages",
                    "singular": "package",
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

impl MavenFacade {
    /// Projects gav search documents into the bridge shape. Versions
    /// are ordered by their publish timestamp, with the Maven version
    /// comparator as tie-break.
    fn project(&self, group: &str, artifact: &str, docs: &[Value]) -> UpstreamPackage {
        let name = format!("{group}:{artifact}");

        let mut versions: Vec<(PackageVersion, Option<i64>)> = docs
            .iter()
            .filter_map(|doc| {
                let version = doc.get("v").and_then(Value::as_str)?;
                let timestamp = doc.get("timestamp").and_then(Value::as_i64);

                let mut attributes = Map::new();
                attributes.insert("version".into(), json!(version));
                if let Some(packaging) = doc.get("p").and_then(Value::as_str) {
                    attributes.insert("packaging".into(), json!(packaging));
                }
                if let Some(published) = timestamp.and_then(format_millis) {
                    attributes.insert("published".into(), json!(published));
                }
                attributes.insert(
                    "downloadurl".into(),
                    json!(artifact_url(&self.repository, group, artifact, version)),
                );

                Some((
                    PackageVersion {
                        version: version.to_string(),
                        attributes,
                    },
                    timestamp,
                ))
            })
            .collect();

        versions.sort_by(|(a, ta), (b, tb)| match (ta, tb) {
            (Some(ta), Some(tb)) => ta.cmp(tb),
            _ => compare_maven_versions(&a.version, &b.version),
        });
        let versions: Vec<PackageVersion> = versions.into_iter().map(|(v, _)| v).collect();

        let default_version = versions.last().map(|v| v.version.clone());

        let mut attributes = Map::new();
        attributes.insert("groupid".into(), json!(group));
        attributes.insert("artifactid".into(), json!(artifact));
        attributes.insert(
            "repository".into(),
            json!(format!("{}/{}/{artifact}", self.repository, group.replace('.', "/"))),
        );

        UpstreamPackage {
            resource_id: self.normalize(&name),
            name,
            default_version,
            versions,
            attributes,
        }
    }
}

fn format_millis(millis: i64) -> Option<String> {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}
