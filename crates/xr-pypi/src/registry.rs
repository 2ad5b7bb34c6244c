//! PyPI registry client.
//!
//! Talks to PyPI via:
//! - Package metadata API (`https://pypi.org/pypi/{package}/json`)
//! - Simple index (`https://pypi.org/simple/`, PEP 691 JSON form) for
//!   the name corpus and search fallback
//!
//! All requests go through the shared cache manager.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use xr_core::cache::CacheManager;
use xr_core::error::Result;

/// Default upstream origin.
pub const PYPI_BASE: &str = "https://pypi.org";

/// Cache TTL for package documents.
const DOCUMENT_TTL: Duration = Duration::from_secs(300);

/// Cache TTL for the simple index; it is large and changes slowly.
const SIMPLE_INDEX_TTL: Duration = Duration::from_secs(3600);

/// Content type selecting the PEP 691 JSON form of the simple index.
const SIMPLE_JSON: &str = "application/vnd.pypi.simple.v1+json";

/// Normalize package name according to PEP 503.
///
/// Converts package name to lowercase and replaces underscores/dots with hyphens,
/// then filters out consecutive hyphens. This ensures consistent package lookups
/// regardless of how the package name is written.
///
/// # Examples
///
/// ```
/// # use xr_pypi::registry::normalize_package_name;
/// assert_eq!(normalize_package_name("Flask"), "flask");
/// assert_eq!(normalize_package_name("django_rest_framework"), "django-rest-framework");
/// assert_eq!(normalize_package_name("Pillow.Image"), "pillow-image");
/// assert_eq!(normalize_package_name("my__package"), "my-package");
/// ```
pub fn normalize_package_name(name: &str) -> String {
    name.to_lowercase()
        .replace(&['_', '.'][..], "-")
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Client for the PyPI JSON and simple APIs.
#[derive(Clone)]
pub struct PypiClient {
    cache: Arc<CacheManager>,
    base: String,
}

impl PypiClient {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { cache, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Fetches the package document (info plus the releases map).
    pub async fn package_doc(&self, name: &str) -> Result<Arc<Value>> {
        let normalized = normalize_package_name(name);
        let url = format!("{}/pypi/{}/json", self.base, urlencoding::encode(&normalized));
        self.cache.fetch_json(&url, DOCUMENT_TTL).await
    }

    /// All project names from the simple index, in index order.
    pub async fn simple_index_names(&self) -> Result<Vec<String>> {
        let url = format!("{}/simple/", self.base);
        let data = self
            .cache
            .fetch_json_with_accept(&url, SIMPLE_INDEX_TTL, SIMPLE_JSON)
            .await?;

        let names = data
            .get("projects")
            .and_then(Value::as_array)
            .map(|projects| {
                projects
                    .iter()
                    .filter_map(|p| p.get("name").and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xr_core::cache::CacheConfig;

    fn client(base: &str) -> PypiClient {
        PypiClient::new(Arc::new(CacheManager::new(CacheConfig::default())), base)
    }

    #[test]
    fn test_normalize_package_name() {
        assert_eq!(normalize_package_name("Flask"), "flask");
        assert_eq!(normalize_package_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_package_name("my__pkg"), "my-pkg");
        assert_eq!(normalize_package_name("A.B_C"), "a-b-c");
    }

    #[tokio::test]
    async fn test_package_doc_uses_normalized_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pypi/flask/json")
            .with_status(200)
            .with_body(r#"{"info": {"name": "Flask"}, "releases": {}}"#)
            .create_async()
            .await;

        let doc = client(&server.url()).package_doc("Flask").await.unwrap();
        assert_eq!(doc["info"]["name"], "Flask");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_simple_index_names() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/simple/")
            .match_header("accept", "application/vnd.pypi.simple.v1+json")
            .with_status(200)
            .with_body(r#"{"projects": [{"name": "flask"}, {"name": "django"}]}"#)
            .create_async()
            .await;

        let names = client(&server.url()).simple_index_names().await.unwrap();
        assert_eq!(names, vec!["flask", "django"]);
    }

    #[tokio::test]
    async fn test_missing_package_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/pypi/nope/json")
            .with_status(404)
            .create_async()
            .await;

        let err = client(&server.url()).package_doc("nope").await.unwrap_err();
        assert_eq!(err.http_status(), 404);
    }
}
