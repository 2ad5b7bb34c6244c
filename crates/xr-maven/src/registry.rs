//! Maven Central search client.
//!
//! Uses the solrsearch API (`https://search.maven.org/solrsearch/
//! select`) for both coordinate search and per-artifact version
//! listings (`core=gav`), and composes repository-layout download URLs
//! under `https://repo1.maven.org/maven2`.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use xr_core::cache::CacheManager;
use xr_core::error::{FacadeError, Result};

/// Default search origin.
pub const SEARCH_BASE: &str = "https://search.maven.org";

/// Default repository origin for download URLs.
pub const REPOSITORY_BASE: &str = "https://repo1.maven.org/maven2";

const DOCUMENT_TTL: Duration = Duration::from_secs(300);

/// Maximum versions requested per artifact listing.
const GAV_ROWS: usize = 200;

/// Splits a `group:artifact` coordinate.
pub fn split_coordinate(name: &str) -> Result<(&str, &str)> {
    match name.split_once(':') {
        Some((group, artifact)) if !group.is_empty() && !artifact.is_empty() => {
            Ok((group, artifact))
        }
        _ => Err(FacadeError::BadRequest(format!(
            "maven coordinates take the form group:artifact, got: {name}"
        ))),
    }
}

/// Repository-layout URL for one artifact version.
pub fn artifact_url(repository: &str, group: &str, artifact: &str, version: &str) -> String {
    format!(
        "{repository}/{}/{artifact}/{version}/{artifact}-{version}.jar",
        group.replace('.', "/")
    )
}

/// Client for the Maven Central search API.
#[derive(Clone)]
pub struct MavenClient {
    cache: Arc<CacheManager>,
    base: String,
}

impl MavenClient {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { cache, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// All version documents for one `group:artifact`, unordered.
    pub async fn version_docs(&self, group: &str, artifact: &str) -> Result<Vec<Value>> {
        let query = format!("g:\"{group}\" AND a:\"{artifact}\"");
        let url = format!(
            "{}/solrsearch/select?q={}&core=gav&rows={}&wt=json",
            self.base,
            urlencoding::encode(&query),
            GAV_ROWS
        );
        let data = self.cache.fetch_json(&url, DOCUMENT_TTL).await?;

        let docs = data
            .pointer("/response/docs")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if docs.is_empty() {
            return Err(FacadeError::NotFound(format!("{group}:{artifact}")));
        }
        Ok(docs)
    }

    /// Coordinate search: returns `group:artifact` ids.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}/solrsearch/select?q={}&rows={}&wt=json",
            self.base,
            urlencoding::encode(query),
            limit
        );
        let data = self.cache.fetch_json(&url, DOCUMENT_TTL).await?;

        Ok(data
            .pointer("/response/docs")
            .and_then(Value::as_array)
            .map(|docs| {
                docs.iter()
                    .filter_map(|d| d.get("id").and_then(Value::as_str))
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

    fn client(base: &str) -> MavenClient {
        MavenClient::new(Arc::new(CacheManager::new(CacheConfig::default())), base)
    }

    #[test]
    fn test_split_coordinate() {
        assert_eq!(
            split_coordinate("com.google.guava:guava").unwrap(),
            ("com.google.guava", "guava")
        );
        assert!(split_coordinate("no-colon").is_err());
        assert!(split_coordinate(":artifact").is_err());
        assert!(split_coordinate("group:").is_err());
    }

    #[test]
    fn test_artifact_url_repository_layout() {
        assert_eq!(
            artifact_url(REPOSITORY_BASE, "com.google.guava", "guava", "33.0.0-jre"),
            "https://repo1.maven.org/maven2/com/google/guava/guava/33.0.0-jre/guava-33.0.0-jre.jar"
        );
    }

    #[tokio::test]
    async fn test_version_docs() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/solrsearch/select\?q=.*core=gav.*$".to_string()),
            )
            .with_status(200)
            .with_body(
                r#"{"response": {"numFound": 2, "docs": [
                    {"id": "g:a:1.0", "g": "g", "a": "a", "v": "1.0", "timestamp": 1500000000000, "p": "jar"},
                    {"id": "g:a:1.1", "g": "g", "a": "a", "v": "1.1", "timestamp": 1600000000000, "p": "jar"}
                ]}}"#,
            )
            .create_async()
            .await;

        let docs = client(&server.url()).version_docs("g", "a").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["v"], "1.0");
    }

    #[tokio::test]
    async fn test_empty_docs_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/solrsearch/select\?.*$".to_string()),
            )
            .with_status(200)
            .with_body(r#"{"response": {"numFound": 0, "docs": []}}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .version_docs("ghost", "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn test_search_extracts_coordinates() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/solrsearch/select\?q=guava.*$".to_string()),
            )
            .with_status(200)
            .with_body(
                r#"{"response": {"docs": [
                    {"id": "com.google.guava:guava", "latestVersion": "33.0.0-jre"}
                ]}}"#,
            )
            .create_async()
            .await;

        let names = client(&server.url()).search("guava", 5).await.unwrap();
        assert_eq!(names, vec!["com.google.guava:guava"]);
    }
}
