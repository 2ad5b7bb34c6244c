//! Docker Hub v2 API client.
//!
//! The anonymous Hub API (`hub.docker.com/v2`) serves repository
//! metadata and tag listings without the token dance of the
//! distribution API, which is all a read-only facade needs.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use xr_core::cache::CacheManager;
use xr_core::error::Result;

/// Default upstream origin.
pub const HUB_BASE: &str = "https://hub.docker.com";

const DOCUMENT_TTL: Duration = Duration::from_secs(300);

/// Tag pages fetched per repository; Hub pages are 100 tags each.
const MAX_TAG_PAGES: usize = 4;

/// Official images live in the implicit `library` namespace.
pub fn qualified_name(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("library/{name}")
    }
}

#[derive(Clone)]
pub struct HubClient {
    cache: Arc<CacheManager>,
    base: String,
}

impl HubClient {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { cache, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Repository metadata document.
    pub async fn repository(&self, name: &str) -> Result<Arc<Value>> {
        let url = format!("{}/v2/repositories/{}", self.base, qualified_name(name));
        self.cache.fetch_json(&url, DOCUMENT_TTL).await
    }

    /// Tag documents, following pagination up to [`MAX_TAG_PAGES`].
    pub async fn tags(&self, name: &str) -> Result<Vec<Value>> {
        let mut url = format!(
            "{}/v2/repositories/{}/tags?page_size=100",
            self.base,
            qualified_name(name)
        );
        let mut tags = Vec::new();

        for _ in 0..MAX_TAG_PAGES {
            let page = self.cache.fetch_json(&url, DOCUMENT_TTL).await?;
            if let Some(results) = page.get("results").and_then(Value::as_array) {
                tags.extend(results.iter().cloned());
            }
            match page.get("next").and_then(Value::as_str) {
                Some(next) if !next.is_empty() => url = next.to_string(),
                _ => break,
            }
        }
        Ok(tags)
    }

    /// Repository-name search.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}/v2/search/repositories?query={}&page_size={}",
            self.base,
            urlencoding::encode(query),
            limit
        );
        let data = self.cache.fetch_json(&url, DOCUMENT_TTL).await?;

        Ok(data
            .get("results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|r| r.get("repo_name").and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xr_core::cache::CacheConfig;

    fn client(base: &str) -> HubClient {
        HubClient::new(Arc::new(CacheManager::new(CacheConfig::default())), base)
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("nginx"), "library/nginx");
        assert_eq!(qualified_name("grafana/grafana"), "grafana/grafana");
    }

    #[tokio::test]
    async fn test_tags_follow_pagination() {
        let mut server = mockito::Server::new_async().await;
        let second_url = format!("{}/v2/repositories/library/nginx/tags?page=2", server.url());
        let _m1 = server
            .mock("GET", "/v2/repositories/library/nginx/tags?page_size=100")
            .with_status(200)
            .with_body(format!(
                r#"{{"next": "{second_url}", "results": [{{"name": "latest"}}]}}"#
            ))
            .create_async()
            .await;
        let _m2 = server
            .mock("GET", "/v2/repositories/library/nginx/tags?page=2")
            .with_status(200)
            .with_body(r#"{"next": null, "results": [{"name": "1.25"}]}"#)
            .create_async()
            .await;

        let tags = client(&server.url()).tags("nginx").await.unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1]["name"], "1.25");
    }

    #[tokio::test]
    async fn test_search() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/v2/search/repositories?query=nginx&page_size=5")
            .with_status(200)
            .with_body(r#"{"results": [{"repo_name": "nginx"}, {"repo_name": "nginxinc/nginx-unprivileged"}]}"#)
            .create_async()
            .await;

        let names = client(&server.url()).search("nginx", 5).await.unwrap();
        assert_eq!(names, vec!["nginx", "nginxinc/nginx-unprivileged"]);
    }
}
