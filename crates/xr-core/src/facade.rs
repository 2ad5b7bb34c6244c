use crate::cache::CacheStats;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;

/// One version of an upstream package, already projected onto the
/// enumerated attribute set of its ecosystem.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    pub version: String,
    pub attributes: Map<String, Value>,
}

/// A package as reported by an upstream registry, normalized into the
/// ecosystem-independent shape the rest of the bridge consumes.
///
/// `versions` is ordered chronologically, oldest first — facades sort
/// before returning, using publish timestamps where the upstream
/// provides them and the ecosystem version ordering otherwise. The
/// ancestor chain and the `versions` document are derived from this
/// order.
#[derive(Debug, Clone)]
pub struct UpstreamPackage {
    /// Display name, as used in URL path segments.
    pub name: String,
    /// Normalized identifier carried in the `<resource>id` attribute.
    pub resource_id: String,
    /// The upstream's latest/stable pointer, absent for empty packages.
    pub default_version: Option<String>,
    /// All versions, oldest first.
    pub versions: Vec<PackageVersion>,
    /// Resource-level metadata (description, license, author, ...).
    pub attributes: Map<String, Value>,
}

impl UpstreamPackage {
    pub fn version(&self, id: &str) -> Option<&PackageVersion> {
        self.versions.iter().find(|v| v.version == id)
    }

    /// String attribute lookup used by filter predicates.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// The seam between the generic registry surface and one upstream
/// ecosystem.
///
/// Implementations translate names and versions into upstream calls and
/// project the upstream payloads back; everything else — caching,
/// filtering, pagination, shaping, rewriting — is shared machinery that
/// only sees this trait.
///
/// # Examples
///
/// ```no_run
/// use async_trait::async_trait;
/// use std::sync::Arc;
/// use xr_core::facade::{RegistryFacade, UpstreamPackage};
/// use xr_core::cache::CacheStats;
///
/// struct DemoFacade;
///
/// #[async_trait]
/// impl RegistryFacade for DemoFacade {
///     fn group_type(&self) -> &'static str { "demoregistries" }
///     fn group_singular(&self) -> &'static str { "demoregistry" }
///     fn group_id(&self) -> &str { "demo.example" }
///     fn resource_plural(&self) -> &'static str { "packages" }
///     fn resource_singular(&self) -> &'static str { "package" }
///     fn upstream_origin(&self) -> &str { "https://registry.demo.example" }
///     fn package_count_estimate(&self) -> u64 { 10 }
///     fn normalize(&self, name: &str) -> String { name.to_lowercase() }
///     fn compare_versions(&self, a: &str, b: &str) -> std::cmp::Ordering { a.cmp(b) }
///     async fn package(&self, _name: &str) -> xr_core::error::Result<Arc<UpstreamPackage>> {
///         todo!()
///     }
///     async fn search_names(&self, _query: &str, _limit: usize) -> xr_core::error::Result<Vec<String>> {
///         Ok(vec![])
///     }
///     fn model(&self) -> serde_json::Value { serde_json::json!({}) }
///     fn cache_stats(&self) -> CacheStats {
///         CacheStats { hits: 0, misses: 0, size: 0, evictions: 0 }
///     }
/// }
/// ```
#[async_trait]
pub trait RegistryFacade: Send + Sync {
    /// Group plural, the first URL path segment (e.g. `noderegistries`).
    fn group_type(&self) -> &'static str;

    /// Group singular, used for the `<group>id` attribute key.
    fn group_singular(&self) -> &'static str;

    /// The single group instance this facade exposes (e.g. `npmjs.org`).
    fn group_id(&self) -> &str;

    /// Resource plural path segment (e.g. `packages`).
    fn resource_plural(&self) -> &'static str;

    /// Resource singular, used for the `<resource>id` attribute key.
    fn resource_singular(&self) -> &'static str;

    /// Upstream origin substituted out of response bodies.
    fn upstream_origin(&self) -> &str;

    /// Advertised collection size; a configured estimate, not live data.
    fn package_count_estimate(&self) -> u64;

    /// Deterministic identifier normalization for this ecosystem.
    fn normalize(&self, name: &str) -> String;

    /// Ecosystem version ordering (semver, PEP 440, Maven rules, ...).
    fn compare_versions(&self, a: &str, b: &str) -> Ordering;

    /// Fetches and projects one package.
    async fn package(&self, name: &str) -> Result<Arc<UpstreamPackage>>;

    /// Upstream name search, the fallback while the index is loading.
    async fn search_names(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Search term used for unfiltered listings while the index is
    /// still loading. Documented as a sample, not a stable slice.
    fn sample_query(&self) -> &'static str {
        "a"
    }

    /// Full name corpus for index construction. Ecosystems without an
    /// enumerable upstream return an empty list and rely on snapshot
    /// files.
    async fn corpus_names(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Static model document for this ecosystem.
    fn model(&self) -> Value;

    /// Counters from this facade's cache manager.
    fn cache_stats(&self) -> CacheStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> UpstreamPackage {
        let mut attributes = Map::new();
        attributes.insert("description".into(), Value::String("web framework".into()));
        UpstreamPackage {
            name: "Express".into(),
            resource_id: "express".into(),
            default_version: Some("4.18.2".into()),
            versions: vec![
                PackageVersion {
                    version: "4.17.0".into(),
                    attributes: Map::new(),
                },
                PackageVersion {
                    version: "4.18.2".into(),
                    attributes: Map::new(),
                },
            ],
            attributes,
        }
    }

    #[test]
    fn test_version_lookup() {
        let pkg = sample_package();
        assert!(pkg.version("4.17.0").is_some());
        assert!(pkg.version("9.9.9").is_none());
    }

    #[test]
    fn test_attr_str() {
        let pkg = sample_package();
        assert_eq!(pkg.attr_str("description"), Some("web framework"));
        assert_eq!(pkg.attr_str("license"), None);
    }
}
