use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Facades the bridge can host.
pub const ALL_FACADES: &[&str] = &["npm", "pypi", "maven", "oci", "mcp"];

/// Bridge configuration, sourced from the environment.
///
/// Every knob is optional; defaults match a local development setup.
/// All facades share one process and one listen port — the bridge
/// dispatches on the group plural.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Listen port (`PORT`).
    pub port: u16,
    /// Listen address (`HOST`).
    pub host: String,
    /// Path segment stripped before routing and re-prepended in `self`
    /// URLs (`API_PATH_PREFIX`). Normalized to empty or `/prefix`.
    pub api_path_prefix: String,
    /// Overrides the forwarded-header derivation (`XREGISTRY_BASEURL`).
    pub base_url: Option<String>,
    /// When set, bearer auth is required (`XREGISTRY_API_KEY`).
    pub api_key: Option<String>,
    /// Suppress per-request trace logging (`XREGISTRY_QUIET`).
    pub quiet: bool,
    /// Root of the per-facade cache directories (`XREGISTRY_CACHE_DIR`).
    pub cache_dir: PathBuf,
    /// Upstream call cap (`XREGISTRY_UPSTREAM_TIMEOUT_SECS`).
    pub upstream_timeout: Duration,
    /// Whole-query filter deadline (`XREGISTRY_FILTER_DEADLINE_SECS`).
    pub filter_deadline: Duration,
    /// Facades to enable (`XREGISTRY_ENABLE`, comma list).
    pub enabled: Vec<String>,
    /// `registryid` of the root document.
    pub registry_id: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            api_path_prefix: String::new(),
            base_url: None,
            api_key: None,
            quiet: false,
            cache_dir: PathBuf::from("./cache"),
            upstream_timeout: Duration::from_secs(5),
            filter_deadline: Duration::from_secs(15),
            enabled: ALL_FACADES.iter().map(ToString::to_string).collect(),
            registry_id: "xregistry-bridge".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Builds the configuration from an explicit variable map, so the
    /// parsing is testable without touching process state.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| vars.get(key).map(String::as_str).filter(|v| !v.is_empty());

        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) {
            config.port = port;
        }
        if let Some(host) = get("HOST") {
            config.host = host.to_string();
        }
        if let Some(prefix) = get("API_PATH_PREFIX") {
            config.api_path_prefix = normalize_prefix(prefix);
        }
        if let Some(base) = get("XREGISTRY_BASEURL") {
            config.base_url = Some(base.trim_end_matches('/').to_string());
        }
        if let Some(key) = get("XREGISTRY_API_KEY") {
            config.api_key = Some(key.to_string());
        }
        if let Some(quiet) = get("XREGISTRY_QUIET") {
            config.quiet = matches!(quiet, "1" | "true" | "yes");
        }
        if let Some(dir) = get("XREGISTRY_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(secs) = get("XREGISTRY_UPSTREAM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = get("XREGISTRY_FILTER_DEADLINE_SECS").and_then(|v| v.parse().ok()) {
            config.filter_deadline = Duration::from_secs(secs);
        }
        if let Some(list) = get("XREGISTRY_ENABLE") {
            let enabled: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|f| ALL_FACADES.contains(f))
                .map(ToString::to_string)
                .collect();
            if !enabled.is_empty() {
                config.enabled = enabled;
            }
        }

        config
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
