//! npm registry client.
//!
//! Talks to the npm registry via:
//! - Package metadata API (`https://registry.npmjs.org/{package}`)
//! - Search API (`https://registry.npmjs.org/-/v1/search`)
//!
//! All requests go through the shared cache manager, so repeated
//! lookups are answered from memory or disk and concurrent misses on
//! one package coalesce into a single upstream call.

use crate::types::SearchResponse;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use xr_core::cache::CacheManager;
use xr_core::error::Result;

/// Default upstream origin.
pub const REGISTRY_BASE: &str = "https://registry.npmjs.org";

/// Cache TTL for package documents and search pages.
const DOCUMENT_TTL: Duration = Duration::from_secs(300);

/// URL path segment for a package name.
///
/// Scoped names keep their literal `@` but escape the inner slash, the
/// form the npm registry expects (`@types%2Fnode`).
pub fn registry_path_segment(name: &str) -> String {
    if let Some(rest) = name.strip_prefix('@') {
        format!("@{}", rest.replace('/', "%2F"))
    } else {
        urlencoding::encode(name).into_owned()
    }
}

/// Client for the npm registry JSON API.
#[derive(Clone)]
pub struct NpmClient {
    cache: Arc<CacheManager>,
    base: String,
}

impl NpmClient {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { cache, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Fetches the full package document (all versions, dist-tags,
    /// publish times).
    pub async fn package_doc(&self, name: &str) -> Result<Arc<Value>> {
        let url = format!("{}/{}", self.base, registry_path_segment(name));
        self.cache.fetch_json(&url, DOCUMENT_TTL).await
    }

    /// Searches package names, relevance-ordered, up to `limit`.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}/-/v1/search?text={}&size={}",
            self.base,
            urlencoding::encode(query),
            limit
        );
        let data = self.cache.fetch_json(&url, DOCUMENT_TTL).await?;
        let response: SearchResponse = serde_json::from_value((*data).clone())
            .map_err(|e| xr_core::error::FacadeError::UpstreamMalformed {
                url,
                detail: e.to_string(),
            })?;

        Ok(response
            .objects
            .into_iter()
            .map(|obj| obj.package.name)
            .collect())
    }
}
