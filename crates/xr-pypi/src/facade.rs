//! The PyPI facade: PEP 503 naming, PEP 440 ordering, release files as
//! version payload.

use crate::registry::{PypiClient, normalize_package_name};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use xr_core::cache::{CacheManager, CacheStats};
use xr_core::error::Result;
use xr_core::facade::{PackageVersion, RegistryFacade, UpstreamPackage};

pub const DEFAULT_PACKAGES_ESTIMATE: u64 = 500_000;

/// PyPI facade over `pypi.org` (or a configured mirror).
pub struct PypiFacade {
    client: PypiClient,
    cache: Arc<CacheManager>,
    estimate: u64,
}

impl PypiFacade {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        Self {
            client: PypiClient::new(Arc::clone(&cache), base),
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
impl RegistryFacade for PypiFacade {
    fn group_type(&self) -> &'static str {
        "pythonregistries"
    }

    fn group_singular(&self) -> &'static str {
        "pythonregistry"
    }

    fn group_id(&self) -> &str {
        "pypi.org"
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

    fn normalize(&self, name: &str) -> String {
        normalize_package_name(name)
    }

    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        match (
            pep440_rs::Version::from_str(a),
            pep440_rs::Version::from_str(b),
        ) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        }
    }

    async fn package(&self, name: &str) -> Result<Arc<UpstreamPackage>> {
        let doc = self.client.package_doc(name).await?;
        Ok(Arc::new(project_package(self, name, &doc)))
    }

    /// PyPI retired its search API; the simple index (already cached
    /// for the corpus) is filtered by prefix instead.
    async fn search_names(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let names = self.client.simple_index_names().await?;
        let query = query.to_lowercase();
        Ok(names
            .into_iter()
            .filter(|name| name.to_lowercase().starts_with(&query))
            .take(limit)
            .collect())
    }

    async fn corpus_names(&self) -> Result<Vec<String>> {
        self.client.simple_index_names().await
    }

    fn model(&self) -> Value {
        json!({
            "plural": "pythonregistries",
            "singular": "pythonregistry",
            "description": "Python package registries",
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

/// Projects the JSON-API document into the bridge shape.
///
/// Release chronology comes from the earliest `upload_time_iso_8601`
/// among a release's files; releases without files fall back to PEP 440
/// order.
fn project_package(facade: &PypiFacade, requested: &str, doc: &Value) -> UpstreamPackage {
    let info = doc.get("info").and_then(Value::as_object);
    let info_str = |key: &str| -> Option<&str> {
        info.and_then(|map| map.get(key)).and_then(Value::as_str)
    };

    let name = info_str("name").unwrap_or(requested).to_string();

    let mut versions: Vec<(PackageVersion, Option<String>)> = doc
        .get("releases")
        .and_then(Value::as_object)
        .map(|releases| {
            releases
                .iter()
                .map(|(version, files)| {
                    let files = files.as_array().cloned().unwrap_or_default();
                    let uploaded = earliest_upload(&files);
                    (
                        PackageVersion {
                            version: version.clone(),
                            attributes: project_release(version, &files, info),
                        },
                        uploaded,
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    versions.sort_by(|(a, ta), (b, tb)| match (ta, tb) {
        (Some(ta), Some(tb)) => ta.cmp(tb),
        _ => facade.compare_versions(&a.version, &b.version),
    });
    let versions: Vec<PackageVersion> = versions.into_iter().map(|(v, _)| v).collect();

    let default_version = info_str("version")
        .map(ToString::to_string)
        .filter(|latest| versions.iter().any(|v| &v.version == latest))
        .or_else(|| versions.last().map(|v| v.version.clone()));

    let mut attributes = Map::new();
    if let Some(summary) = info_str("summary").filter(|s| !s.is_empty()) {
        attributes.insert("description".into(), json!(summary));
    }
    if let Some(license) = info_str("license").filter(|s| !s.is_empty()) {
        attributes.insert("license".into(), json!(license));
    }
    if let Some(author) = info_str("author").filter(|s| !s.is_empty()) {
        attributes.insert("author".into(), json!(author));
    }
    if let Some(homepage) = homepage_of(info) {
        attributes.insert("homepage".into(), json!(homepage));
    }
    if let Some(repository) = repository_of(info) {
        attributes.insert("repository".into(), json!(repository));
    }
    if let Some(keywords) = info_str("keywords").filter(|s| !s.is_empty()) {
        let split: Vec<&str> = keywords
            .split([',', ' '])
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect();
        attributes.insert("keywords".into(), json!(split));
    }

    UpstreamPackage {
        resource_id: facade.normalize(&name),
        name,
        default_version,
        versions,
        attributes,
    }
}

fn earliest_upload(files: &[Value]) -> Option<String> {
    files
        .iter()
        .filter_map(|f| f.get("upload_time_iso_8601").and_then(Value::as_str))
        .min()
        .map(ToString::to_string)
}

fn project_release(
    version: &str,
    files: &[Value],
    info: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("version".into(), json!(version));

    if let Some(requires) = info
        .and_then(|map| map.get("requires_python"))
        .and_then(Value::as_str)
    {
        attributes.insert("requires_python".into(), json!(requires));
    }

    let yanked = files
        .iter()
        .any(|f| f.get("yanked").and_then(Value::as_bool).unwrap_or(false));
    if yanked {
        attributes.insert("yanked".into(), json!(true));
    }

    let projected: Vec<Value> = files
        .iter()
        .filter_map(|f| {
            let filename = f.get("filename").and_then(Value::as_str)?;
            let url = f.get("url").and_then(Value::as_str)?;
            let mut file = Map::new();
            file.insert("filename".into(), json!(filename));
            file.insert("url".into(), json!(url));
            if let Some(size) = f.get("size").and_then(Value::as_u64) {
                file.insert("size".into(), json!(size));
            }
            if let Some(uploaded) = f.get("upload_time_iso_8601").and_then(Value::as_str) {
                file.insert("uploaded".into(), json!(uploaded));
            }
            Some(Value::Object(file))
        })
        .collect();
    if !projected.is_empty() {
        attributes.insert("files".into(), Value::Array(projected));
    }

    attributes
}

fn homepage_of(info: Option<&Map<String, Value>>) -> Option<String> {
    let info = info?;
    if let Some(home) = info.get("home_page").and_then(Value::as_str) {
        if !home.is_empty() {
            return Some(home.to_string());
        }
    }
    info.get("project_urls")
        .and_then(Value::as_object)?
        .get("Homepage")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn repository_of(info: Option<&Map<String, Value>>) -> Option<String> {
    let urls = info?.get("project_urls").and_then(Value::as_object)?;
    for key in ["Repository", "Source", "Source Code", "Code"] {
        if let Some(url) = urls.get(key).and_then(Value::as_str) {
            return Some(url.to_string());
        }
    }
    None
}
