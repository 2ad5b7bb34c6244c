use crate::error::{FacadeError, Result};
use crate::single_flight::FlightGroup;
use dashmap::DashMap;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Fraction of entries removed when the memory tier reaches capacity.
const EVICTION_DIVISOR: usize = 10;

/// Configuration for a [`CacheManager`].
///
/// Every facade owns one manager; facades sharing a process must use
/// disjoint `cache_dir` values so their disk tiers never collide.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Memory-tier capacity in entries.
    pub max_entries: usize,
    /// Disk-tier directory. `None` disables persistence.
    pub cache_dir: Option<PathBuf>,
    /// Hard cap per upstream call.
    pub timeout: Duration,
    /// Upstream requests in flight at once; excess callers queue.
    pub max_in_flight: usize,
    /// User agent sent on every upstream request.
    pub user_agent: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            cache_dir: None,
            timeout: Duration::from_secs(5),
            max_in_flight: 16,
            user_agent: format!("xr-bridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Point-in-time counters reported by `/performance/stats`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub evictions: u64,
}

struct CacheEntry {
    value: Arc<Value>,
    stored_at: Instant,
    ttl: Duration,
    last_used: Instant,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() <= self.ttl
    }
}

/// Serialized form of a disk-tier entry.
///
/// The original URL is stored alongside the value so a hash collision (or
/// a stray file) is detected and discarded instead of served.
#[derive(Serialize, Deserialize)]
struct DiskEntry {
    url: String,
    stored_at: u64,
    ttl_secs: u64,
    value: Value,
}

impl DiskEntry {
    fn is_fresh(&self, now: u64) -> bool {
        now.saturating_sub(self.stored_at) <= self.ttl_secs
    }
}

/// Tiered upstream response cache: bounded memory over one-file-per-key
/// disk persistence, with per-key single-flight coalescing.
///
/// Lookup order is memory, then disk, then network. Fresh results are
/// written through to both tiers. An expired disk copy is kept as a
/// "warm" value and served only when the refresh attempt fails with a
/// transient error; definite upstream answers (404, 429) always
/// propagate.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use xr_core::cache::{CacheConfig, CacheManager};
///
/// # async fn example() -> xr_core::error::Result<()> {
/// let cache = CacheManager::new(CacheConfig::default());
/// let doc = cache
///     .fetch_json("https://registry.npmjs.org/express", Duration::from_secs(300))
///     .await?;
/// assert!(doc.get("versions").is_some());
/// # Ok(())
/// # }
/// ```
pub struct CacheManager {
    entries: DashMap<String, CacheEntry>,
    flights: FlightGroup<String, Arc<Value>, FacadeError>,
    client: Client,
    outbound: tokio::sync::Semaphore,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("failed to create HTTP client");

        Self {
            entries: DashMap::new(),
            flights: FlightGroup::new(),
            client,
            outbound: tokio::sync::Semaphore::new(config.max_in_flight.max(1)),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Fetches `url` as JSON, honoring both cache tiers and `ttl`.
    pub async fn fetch_json(&self, url: &str, ttl: Duration) -> Result<Arc<Value>> {
        self.fetch_json_with_accept(url, ttl, "application/json").await
    }

    /// Like [`fetch_json`](Self::fetch_json) with an explicit `Accept`
    /// header, for upstreams that dispatch on content negotiation (the
    /// PyPI simple index, OCI manifest endpoints).
    pub async fn fetch_json_with_accept(
        &self,
        url: &str,
        ttl: Duration,
        accept: &str,
    ) -> Result<Arc<Value>> {
        if let Some(value) = self.memory_lookup(url) {
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let accept = accept.to_string();
        self.flights
            .run(url.to_string(), || self.load(url.to_string(), ttl, accept))
            .await
            .map_err(|shared| (*shared).clone())
    }

    /// Returns the cached value for `key`, or runs `compute` to produce
    /// it, with the same single-flight guarantee as network fetches.
    ///
    /// Computed values live in the memory tier only. Callers namespace
    /// their keys (`"corpus:npm"`) so they cannot collide with URLs.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<Value>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(value) = self.memory_lookup(key) {
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let result = self
            .flights
            .run(key.to_string(), || async {
                let value = Arc::new(compute().await?);
                self.store_memory(key, Arc::clone(&value), ttl);
                Ok(value)
            })
            .await;
        result.map_err(|shared| (*shared).clone())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn memory_lookup(&self, key: &str) -> Option<Arc<Value>> {
        let mut entry = self.entries.get_mut(key)?;
        if !entry.is_fresh() {
            // Expired entries are ignored; the refresh path replaces them.
            return None;
        }
        entry.last_used = Instant::now();
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(Arc::clone(&entry.value))
    }

    async fn load(&self, url: String, ttl: Duration, accept: String) -> Result<Arc<Value>> {
        let mut warm: Option<Arc<Value>> = None;
        if let Some(disk) = self.disk_read(&url).await {
            let now = unix_now();
            let is_fresh = disk.is_fresh(now);
            let age = now.saturating_sub(disk.stored_at);
            let remaining = Duration::from_secs(disk.ttl_secs.saturating_sub(age));
            let value = Arc::new(disk.value);
            if is_fresh {
                self.store_memory(&url, Arc::clone(&value), remaining);
                return Ok(value);
            }
            warm = Some(value);
        }

        match self.fetch_network(&url, &accept).await {
            Ok(value) => {
                self.disk_write(&url, &value, ttl).await;
                self.store_memory(&url, Arc::clone(&value), ttl);
                Ok(value)
            }
            Err(err) if err.is_retryable() => match warm {
                Some(warm) => {
                    tracing::warn!(url = %url, error = %err, "serving warm disk copy after upstream failure");
                    Ok(warm)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    async fn fetch_network(&self, url: &str, accept: &str) -> Result<Arc<Value>> {
        // Backpressure: bound concurrent upstream calls per facade.
        let _permit = self
            .outbound
            .acquire()
            .await
            .map_err(|_| FacadeError::Internal("upstream limiter closed".to_string()))?;

        tracing::debug!(url = %url, "fetching upstream");

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FacadeError::UpstreamTimeout {
                        url: url.to_string(),
                        seconds: self.config.timeout.as_secs(),
                    }
                } else {
                    FacadeError::UpstreamUnavailable {
                        url: url.to_string(),
                        detail: e.to_string(),
                    }
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(FacadeError::NotFound(url.to_string()));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(FacadeError::RateLimited {
                    url: url.to_string(),
                });
            }
            status if !status.is_success() => {
                return Err(FacadeError::UpstreamUnavailable {
                    url: url.to_string(),
                    detail: format!("HTTP {status}"),
                });
            }
            _ => {}
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FacadeError::UpstreamTimeout {
                    url: url.to_string(),
                    seconds: self.config.timeout.as_secs(),
                }
            } else {
                FacadeError::UpstreamUnavailable {
                    url: url.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

        let value: Value =
            serde_json::from_slice(&body).map_err(|e| FacadeError::UpstreamMalformed {
                url: url.to_string(),
                detail: e.to_string(),
            })?;

        Ok(Arc::new(value))
    }

    fn store_memory(&self, key: &str, value: Arc<Value>, ttl: Duration) {
        if self.entries.len() >= self.config.max_entries {
            self.evict_entries();
        }
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: now,
                ttl,
                last_used: now,
            },
        );
    }

    /// Removes roughly 10% of the memory tier, least-recently-used first.
    fn evict_entries(&self) {
        let target_removals = (self.config.max_entries / EVICTION_DIVISOR).max(1);

        let mut candidates: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_used))
            .collect();
        candidates.sort_by_key(|(_, last_used)| *last_used);

        let mut removed = 0u64;
        for (key, _) in candidates.iter().take(target_removals) {
            self.entries.remove(key);
            removed += 1;
        }

        self.evictions.fetch_add(removed, Ordering::Relaxed);
        tracing::debug!(removed, "evicted cache entries");
    }

    fn disk_path(&self, url: &str) -> Option<PathBuf> {
        let dir = self.config.cache_dir.as_ref()?;
        Some(dir.join(format!("{}.json", hash_key(url))))
    }

    async fn disk_read(&self, url: &str) -> Option<DiskEntry> {
        let path = self.disk_path(url)?;
        let raw = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<DiskEntry>(&raw) {
            Ok(entry) if entry.url == url => Some(entry),
            Ok(_) | Err(_) => {
                tracing::warn!(path = %path.display(), "removing corrupt cache file");
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
        }
    }

    /// Write-through to disk. Failures degrade to memory-only caching.
    async fn disk_write(&self, url: &str, value: &Value, ttl: Duration) {
        let Some(path) = self.disk_path(url) else {
            return;
        };
        let entry = DiskEntry {
            url: url.to_string(),
            stored_at: unix_now(),
            ttl_secs: ttl.as_secs(),
            value: value.clone(),
        };
        if let Err(err) = write_atomic(&path, &entry).await {
            tracing::warn!(path = %path.display(), error = %err, "cache persistence failed");
        }
    }
}

/// Temp-file-then-rename so readers never observe a partial entry.
async fn write_atomic(path: &Path, entry: &DiskEntry) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let raw = serde_json::to_vec(entry)?;
    tokio::fs::write(&tmp, raw).await?;
    tokio::fs::rename(&tmp, path).await
}

fn hash_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
