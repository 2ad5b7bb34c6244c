//! The npm facade: maps the npm registry dialect onto the generic
//! `RegistryFacade` seam.

use crate::registry::NpmClient;
use crate::types::DistTags;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::sync::Arc;
use xr_core::cache::{CacheManager, CacheStats};
use xr_core::error::Result;
use xr_core::facade::{PackageVersion, RegistryFacade, UpstreamPackage};

/// Advertised corpus size. The npm registry has no cheap live count;
/// this is a documented estimate.
pub const DEFAULT_PACKAGES_ESTIMATE: u64 = 2_000_000;

/// Resource-level attributes copied from the package document.
const RESOURCE_ATTRIBUTES: &[&str] = &["description", "homepage", "keywords"];

/// Version-payload attributes copied when present. Everything else in
/// the upstream version object (readme blobs, internal `_` fields) is
/// dropped.
const VERSION_ATTRIBUTES: &[&str] = &[
    "description",
    "homepage",
    "keywords",
    "main",
    "types",
    "bin",
    "engines",
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
    "deprecated",
    "dist",
    "bugs",
];

/// npm facade over `registry.npmjs.org` (or a configured mirror).
pub struct NpmFacade {
    client: NpmClient,
    cache: Arc<CacheManager>,
    estimate: u64,
}

impl NpmFacade {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        Self {
            client: NpmClient::new(Arc::clone(&cache), base),
            cache,
            estimate: DEFAULT_PACKAGES_ESTIMATE,
        }
    }

    pub fn with_estimate(mut self, estimate: u64) -> Self {
        self.estimate = estimate;
        self
    }
}

#[async_trait]
impl RegistryFacade for NpmFacade {
    fn group_type(&self) -> &'static str {
        "noderegistries"
    }

    fn group_singular(&self) -> &'static str {
        "noderegistry"
    }

    fn group_id(&self) -> &str {
        "npmjs.org"
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

    /// npm names are already lowercase on the registry; scoped names
    /// keep their `@scope/` prefix.
    fn normalize(&self, name: &str) -> String {
        name.to_lowercase()
    }

    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        match (
            node_semver::Version::parse(a),
            node_semver::Version::parse(b),
        ) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        }
    }

    async fn package(&self, name: &str) -> Result<Arc<UpstreamPackage>> {
        let doc = self.client.package_doc(name).await?;
        Ok(Arc::new(project_package(self, name, &doc)))
    }

    async fn search_names(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        self.client.search(query, limit).await
    }

    fn sample_query(&self) -> &'static str {
        // The historical sample query for unfiltered listings while the
        // index is loading; documented as a sample, not a stable slice.
        "react"
    }

    fn model(&self) -> Value {
        json!({
            "plural": "noderegistries",
            "singular": "noderegistry",
            "description": "Node.js package registries",
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

/// Projects the raw package document into the bridge shape.
///
/// Versions come out chronologically ordered: the document's `time` map
/// drives the order, with the semver comparator as tie-break for
/// versions that have no recorded publish time.
fn project_package(facade: &NpmFacade, requested: &str, doc: &Value) -> UpstreamPackage {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(requested)
        .to_string();

    let times = doc.get("time").and_then(Value::as_object);
    let publish_time = |version: &str| -> Option<&str> {
        times.and_then(|map| map.get(version)).and_then(Value::as_str)
    };

    let mut versions: Vec<PackageVersion> = doc
        .get("versions")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(version, vdoc)| PackageVersion {
                    version: version.clone(),
                    attributes: project_version(vdoc),
                })
                .collect()
        })
        .unwrap_or_default();

    versions.sort_by(|a, b| match (publish_time(&a.version), publish_time(&b.version)) {
        (Some(ta), Some(tb)) => ta.cmp(tb),
        _ => facade.compare_versions(&a.version, &b.version),
    });

    let dist_tags: DistTags = doc
        .get("dist-tags")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let default_version = dist_tags
        .latest
        .filter(|latest| versions.iter().any(|v| &v.version == latest))
        .or_else(|| versions.last().map(|v| v.version.clone()));

    let mut attributes = Map::new();
    for key in RESOURCE_ATTRIBUTES {
        if let Some(value) = doc.get(*key) {
            if !value.is_null() {
                attributes.insert((*key).to_string(), value.clone());
            }
        }
    }
    if let Some(license) = doc.get("license").and_then(flatten_license) {
        attributes.insert("license".into(), Value::String(license));
    }
    if let Some(author) = doc.get("author").and_then(flatten_person) {
        attributes.insert("author".into(), Value::String(author));
    }
    if let Some(repository) = doc.get("repository").and_then(flatten_repository) {
        attributes.insert("repository".into(), Value::String(repository));
    }

    UpstreamPackage {
        resource_id: facade.normalize(&name),
        name,
        default_version,
        versions,
        attributes,
    }
}

/// Copies the enumerated version attributes, flattening the structured
/// `license`/`author`/`repository` forms to strings.
fn project_version(vdoc: &Value) -> Map<String, Value> {
    let mut attributes = Map::new();
    for key in VERSION_ATTRIBUTES {
        if let Some(value) = vdoc.get(*key) {
            if !value.is_null() {
                attributes.insert((*key).to_string(), value.clone());
            }
        }
    }
    if let Some(license) = vdoc.get("license").and_then(flatten_license) {
        attributes.insert("license".into(), Value::String(license));
    }
    if let Some(author) = vdoc.get("author").and_then(flatten_person) {
        attributes.insert("author".into(), Value::String(author));
    }
    if let Some(repository) = vdoc.get("repository").and_then(flatten_repository) {
        attributes.insert("repository".into(), Value::String(repository));
    }
    attributes
}

// npm historically allows both string and object forms for these
// fields; the bridge always serves the string form.

fn flatten_license(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("type").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn flatten_person(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn flatten_repository(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("url").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}
