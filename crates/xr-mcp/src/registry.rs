//! MCP registry client (`registry.modelcontextprotocol.io`, v0 API).

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use xr_core::cache::CacheManager;
use xr_core::error::Result;

/// Default upstream origin.
pub const MCP_BASE: &str = "https://registry.modelcontextprotocol.io";

const DOCUMENT_TTL: Duration = Duration::from_secs(300);

/// Listing pages fetched when building the corpus.
const MAX_LIST_PAGES: usize = 10;

#[derive(Clone)]
pub struct McpClient {
    cache: Arc<CacheManager>,
    base: String,
}

impl McpClient {
    pub fn new(cache: Arc<CacheManager>, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { cache, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// All published versions of one server, newest data first as the
    /// upstream returns them.
    pub async fn server_versions(&self, name: &str) -> Result<Vec<Value>> {
        let url = format!(
            "{}/v0/servers/{}/versions",
            self.base,
            urlencoding::encode(name)
        );
        let data = self.cache.fetch_json(&url, DOCUMENT_TTL).await?;
        Ok(data
            .get("servers")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Walks the paginated listing and returns every server name.
    pub async fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let url = match &cursor {
                Some(cursor) => format!(
                    "{}/v0/servers?limit=100&cursor={}",
                    self.base,
                    urlencoding::encode(cursor)
                ),
                None => format!("{}/v0/servers?limit=100", self.base),
            };
            let page = self.cache.fetch_json(&url, DOCUMENT_TTL).await?;

            if let Some(servers) = page.get("servers").and_then(Value::as_array) {
                names.extend(
                    servers
                        .iter()
                        .filter_map(|s| s.get("name").and_then(Value::as_str))
                        .map(ToString::to_string),
                );
            }

            cursor = page
                .pointer("/metadata/next_cursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(ToString::to_string);
            if cursor.is_none() {
                break;
            }
        }
        Ok(names)
    }
}
