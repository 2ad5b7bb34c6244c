use crate::error::{FacadeError, Result};
use crate::facade::{RegistryFacade, UpstreamPackage};
use crate::index::NameIndex;
use crate::page::{Page, SortSpec};
use dashmap::DashMap;
use futures::StreamExt;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Attribute fields a filter clause may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Name,
    Description,
    Author,
    License,
    Homepage,
    Keywords,
    Version,
    Repository,
}

impl FilterField {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "name" => Ok(Self::Name),
            "description" => Ok(Self::Description),
            "author" => Ok(Self::Author),
            "license" => Ok(Self::License),
            "homepage" => Ok(Self::Homepage),
            "keywords" => Ok(Self::Keywords),
            "version" => Ok(Self::Version),
            "repository" => Ok(Self::Repository),
            other => Err(FacadeError::BadRequest(format!(
                "unknown filter field: {other}"
            ))),
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Author => "author",
            Self::License => "license",
            Self::Homepage => "homepage",
            Self::Keywords => "keywords",
            Self::Version => "version",
            Self::Repository => "repository",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// Compiled clause value: literal comparison or anchored wildcard.
///
/// Both forms are case-insensitive; `*` is the only wildcard character.
#[derive(Debug, Clone)]
enum ValueMatcher {
    Exact(String),
    Wildcard(Regex),
}

impl ValueMatcher {
    fn compile(raw: &str) -> Result<Self> {
        if !raw.contains('*') {
            return Ok(Self::Exact(raw.to_lowercase()));
        }
        let mut pattern = String::with_capacity(raw.len() + 8);
        pattern.push_str("(?i)^");
        for part in raw.split('*') {
            pattern.push_str(&regex::escape(part));
            pattern.push_str(".*");
        }
        // The trailing ".*" from the last segment is dropped so the
        // pattern stays anchored at both ends.
        pattern.truncate(pattern.len() - 2);
        pattern.push('$');

        let regex = Regex::new(&pattern)
            .map_err(|e| FacadeError::BadRequest(format!("invalid filter pattern: {e}")))?;
        Ok(Self::Wildcard(regex))
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact(value) => candidate.to_lowercase() == *value,
            Self::Wildcard(regex) => regex.is_match(candidate),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterClause {
    pub field: FilterField,
    pub op: FilterOp,
    pub value: String,
    matcher: ValueMatcher,
}

impl FilterClause {
    /// Literal prefix of the clause value, up to the first wildcard.
    fn literal_prefix(&self) -> &str {
        self.value.split('*').next().unwrap_or("")
    }

    fn matches_name(&self, name: &str) -> bool {
        let hit = self.matcher.matches(name);
        match self.op {
            FilterOp::Eq => hit,
            FilterOp::Ne => !hit,
        }
    }

    fn matches_package(&self, pkg: &UpstreamPackage) -> bool {
        let hit = match self.field {
            FilterField::Name => self.matcher.matches(&pkg.name),
            FilterField::Version => pkg
                .default_version
                .as_deref()
                .is_some_and(|v| self.matcher.matches(v)),
            FilterField::Keywords => pkg
                .attributes
                .get("keywords")
                .and_then(Value::as_array)
                .is_some_and(|keywords| {
                    keywords
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|k| self.matcher.matches(k))
                }),
            field => pkg.attr_str(field.key()).is_some_and(|v| self.matcher.matches(v)),
        };
        match self.op {
            FilterOp::Eq => hit,
            // Absent attributes satisfy a != clause.
            FilterOp::Ne => !hit,
        }
    }
}

/// A parsed `filter=` expression: `&`-joined clauses, all of which must
/// hold (AND semantics).
#[derive(Debug, Clone)]
pub struct FilterExpr {
    pub clauses: Vec<FilterClause>,
    canonical: String,
}

impl FilterExpr {
    /// Parses the raw flag value.
    ///
    /// Grammar: `clause (& clause)*` with `clause = field ('=' | '!=')
    /// value` and `*` wildcards in values.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut clauses = Vec::new();
        for part in raw.split('&') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (field_raw, op, value) = if let Some((f, v)) = part.split_once("!=") {
                (f, FilterOp::Ne, v)
            } else if let Some((f, v)) = part.split_once('=') {
                (f, FilterOp::Eq, v)
            } else {
                return Err(FacadeError::BadRequest(format!(
                    "filter clause has no comparator: {part}"
                )));
            };

            clauses.push(FilterClause {
                field: FilterField::parse(field_raw.trim())?,
                op,
                value: value.to_string(),
                matcher: ValueMatcher::compile(value)?,
            });
        }

        if clauses.is_empty() {
            return Err(FacadeError::BadRequest("empty filter expression".into()));
        }

        let canonical = clauses
            .iter()
            .map(|c| {
                let op = match c.op {
                    FilterOp::Eq => "=",
                    FilterOp::Ne => "!=",
                };
                format!("{}{}{}", c.field.key(), op, c.value.to_lowercase())
            })
            .collect::<Vec<_>>()
            .join("&");

        Ok(Self { clauses, canonical })
    }

    fn name_clauses(&self) -> Vec<&FilterClause> {
        self.clauses
            .iter()
            .filter(|c| c.field == FilterField::Name)
            .collect()
    }

    fn meta_clauses(&self) -> Vec<&FilterClause> {
        self.clauses
            .iter()
            .filter(|c| c.field != FilterField::Name)
            .collect()
    }

    /// First positive name clause, if any; drives prefix ordering and
    /// the upstream-search fallback.
    fn primary_name_clause(&self) -> Option<&FilterClause> {
        self.clauses
            .iter()
            .find(|c| c.field == FilterField::Name && c.op == FilterOp::Eq)
    }
}

/// Tuning knobs for [`FilterEngine`].
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Hard fan-out cap for step-2 metadata fetches per query.
    pub max_metadata_fetches: usize,
    /// In-flight upstream fetches during enrichment.
    pub concurrency: usize,
    /// Result-LRU capacity.
    pub result_cache_size: usize,
    /// Result-LRU entry age cap.
    pub result_cache_age: Duration,
    /// Whole-query deadline; also bounds the sort readiness barrier.
    pub deadline: Duration,
    /// Candidate count requested from the upstream-search fallback.
    pub fallback_search_size: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_metadata_fetches: 100,
            concurrency: 16,
            result_cache_size: 2000,
            result_cache_age: Duration::from_secs(600),
            deadline: Duration::from_secs(15),
            fallback_search_size: 50,
        }
    }
}

/// One surviving candidate. `package` is populated only when step-2
/// enrichment ran for this query.
#[derive(Debug, Clone)]
pub struct FilterHit {
    pub name: String,
    pub package: Option<Arc<UpstreamPackage>>,
}

/// The sliced result page plus how it was produced.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub hits: Vec<FilterHit>,
    pub enriched: bool,
}

struct CachedOutcome {
    names: Vec<String>,
    enriched: bool,
    stored_at: Instant,
}

/// Two-step filter evaluator over a facade's name index.
///
/// Step 1 answers every `name`-scoped clause from the in-memory index.
/// Step 2 fetches metadata only for surviving candidates, never more
/// than `max_metadata_fetches` per query, stopping as soon as the page
/// is provably complete. A candidate whose metadata fetch fails is
/// dropped; the query still succeeds with the remaining survivors.
pub struct FilterEngine {
    index: Arc<NameIndex>,
    results: DashMap<String, CachedOutcome>,
    config: FilterConfig,
}

impl FilterEngine {
    pub fn new(index: Arc<NameIndex>, config: FilterConfig) -> Self {
        Self {
            index,
            results: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Evaluates a filtered collection query.
    pub async fn evaluate(
        &self,
        facade: &dyn RegistryFacade,
        expr: &FilterExpr,
        page: Page,
        sort: Option<&SortSpec>,
    ) -> Result<FilterOutcome> {
        let cache_key = self.cache_key(&expr.canonical, page, sort);
        if let Some(cached) = self.cached(&cache_key) {
            return Ok(cached);
        }

        if sort.is_some() {
            self.index.await_ready(self.config.deadline).await;
        }

        let candidates = if self.index.is_ready() {
            self.indexed_candidates(expr)
        } else {
            self.fallback_candidates(facade, expr, page).await?
        };

        let meta_clauses = expr.meta_clauses();
        let needs_enrichment =
            !meta_clauses.is_empty() || sort.is_some_and(|s| s.field != "name");

        let outcome = if needs_enrichment {
            self.enrich(facade, candidates, &meta_clauses, page, sort)
                .await
        } else {
            let ordered = order_names(candidates, sort);
            let (start, end) = page.bounds(ordered.len());
            FilterOutcome {
                hits: ordered[start..end]
                    .iter()
                    .map(|name| FilterHit {
                        name: name.clone(),
                        package: None,
                    })
                    .collect(),
                enriched: false,
            }
        };

        self.store(cache_key, &outcome);
        Ok(outcome)
    }

    /// Evaluates an unfiltered collection listing.
    ///
    /// With the index ready this is a deterministic slice of the sorted
    /// corpus; before that it degrades to the facade's documented sample
    /// search.
    pub async fn evaluate_listing(
        &self,
        facade: &dyn RegistryFacade,
        page: Page,
        sort: Option<&SortSpec>,
    ) -> Result<FilterOutcome> {
        if sort.is_some() {
            self.index.await_ready(self.config.deadline).await;
        }

        let candidates = if self.index.is_ready() {
            self.index.snapshot().as_ref().clone()
        } else {
            let mut names = facade
                .search_names(facade.sample_query(), self.config.fallback_search_size)
                .await?;
            names.sort();
            names.dedup();
            names
        };

        if sort.is_some_and(|s| s.field != "name") {
            return Ok(self.enrich(facade, candidates, &[], page, sort).await);
        }

        let ordered = order_names(candidates, sort);
        let (start, end) = page.bounds(ordered.len());
        Ok(FilterOutcome {
            hits: ordered[start..end]
                .iter()
                .map(|name| FilterHit {
                    name: name.clone(),
                    package: None,
                })
                .collect(),
            enriched: false,
        })
    }

    /// Step 1: candidates from the index, prefix matches first.
    fn indexed_candidates(&self, expr: &FilterExpr) -> Vec<String> {
        let name_clauses = expr.name_clauses();
        let prefix = expr
            .primary_name_clause()
            .map(|c| c.literal_prefix().to_lowercase())
            .unwrap_or_default();

        let snapshot = self.index.snapshot();
        let mut prefixed = Vec::new();
        let mut rest = Vec::new();
        for name in snapshot.iter() {
            if !name_matches_all(&name_clauses, name) {
                continue;
            }
            if !prefix.is_empty() && name.to_lowercase().starts_with(&prefix) {
                prefixed.push(name.clone());
            } else {
                rest.push(name.clone());
            }
        }
        prefixed.extend(rest);
        prefixed
    }

    /// Index-not-ready fallback: one upstream search, filtered locally.
    async fn fallback_candidates(
        &self,
        facade: &dyn RegistryFacade,
        expr: &FilterExpr,
        page: Page,
    ) -> Result<Vec<String>> {
        let query = expr
            .primary_name_clause()
            .map(|c| c.literal_prefix().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| facade.sample_query().to_string());

        let size = self.config.fallback_search_size.max(page.needed());
        let mut names = facade.search_names(&query, size).await?;
        names.sort();
        names.dedup();

        let name_clauses = expr.name_clauses();
        Ok(names
            .into_iter()
            .filter(|name| name_matches_all(&name_clauses, name))
            .collect())
    }

    /// Step 2: bounded metadata enrichment.
    async fn enrich(
        &self,
        facade: &dyn RegistryFacade,
        candidates: Vec<String>,
        meta_clauses: &[&FilterClause],
        page: Page,
        sort: Option<&SortSpec>,
    ) -> FilterOutcome {
        // With a sort in play every survivor inside the fan-out cap must
        // be collected before slicing; otherwise the page boundary is
        // enough.
        let needed = if sort.is_some() {
            usize::MAX
        } else {
            page.needed()
        };
        let deadline = tokio::time::Instant::now() + self.config.deadline;

        let mut survivors: Vec<(String, Arc<UpstreamPackage>)> = Vec::new();
        {
            let mut stream = futures::stream::iter(
                candidates
                    .into_iter()
                    .take(self.config.max_metadata_fetches)
                    .map(|name| async move {
                        let fetched = facade.package(&name).await;
                        (name, fetched)
                    }),
            )
            .buffered(self.config.concurrency.max(1));

            loop {
                let next = tokio::time::timeout_at(deadline, stream.next()).await;
                match next {
                    Ok(Some((name, Ok(pkg)))) => {
                        if meta_clauses.iter().all(|c| c.matches_package(&pkg)) {
                            survivors.push((name, pkg));
                            if survivors.len() >= needed {
                                break;
                            }
                        }
                    }
                    Ok(Some((name, Err(err)))) => {
                        tracing::debug!(name = %name, error = %err, "dropping candidate after metadata failure");
                    }
                    Ok(None) => break,
                    Err(_) => {
                        tracing::warn!("filter deadline reached, returning partial survivors");
                        break;
                    }
                }
            }
            // Dropping the stream cancels any fetch still in flight.
        }

        if let Some(sort) = sort {
            sort_survivors(facade, &mut survivors, sort);
        }

        let (start, end) = page.bounds(survivors.len());
        FilterOutcome {
            hits: survivors[start..end]
                .iter()
                .map(|(name, pkg)| FilterHit {
                    name: name.clone(),
                    package: Some(Arc::clone(pkg)),
                })
                .collect(),
            enriched: true,
        }
    }

    fn cache_key(&self, canonical: &str, page: Page, sort: Option<&SortSpec>) -> String {
        let sort_key = sort
            .map(|s| format!("{}:{}", s.field, if s.ascending { "asc" } else { "desc" }))
            .unwrap_or_default();
        format!("{canonical}|{}|{}|{sort_key}", page.limit, page.offset)
    }

    fn cached(&self, key: &str) -> Option<FilterOutcome> {
        let entry = self.results.get(key)?;
        if entry.stored_at.elapsed() > self.config.result_cache_age {
            return None;
        }
        Some(FilterOutcome {
            hits: entry
                .names
                .iter()
                .map(|name| FilterHit {
                    name: name.clone(),
                    package: None,
                })
                .collect(),
            enriched: entry.enriched,
        })
    }

    fn store(&self, key: String, outcome: &FilterOutcome) {
        if self.results.len() >= self.config.result_cache_size {
            self.evict_results();
        }
        self.results.insert(
            key,
            CachedOutcome {
                names: outcome.hits.iter().map(|h| h.name.clone()).collect(),
                enriched: outcome.enriched,
                stored_at: Instant::now(),
            },
        );
    }

    /// Removes the oldest tenth of cached results once at capacity.
    fn evict_results(&self) {
        let target = (self.config.result_cache_size / 10).max(1);
        let mut entries: Vec<(String, Instant)> = self
            .results
            .iter()
            .map(|e| (e.key().clone(), e.value().stored_at))
            .collect();
        entries.sort_by_key(|(_, at)| *at);
        for (key, _) in entries.iter().take(target) {
            self.results.remove(key);
        }
    }
}

fn name_matches_all(clauses: &[&FilterClause], name: &str) -> bool {
    clauses.iter().all(|c| c.matches_name(name))
}

fn order_names(mut names: Vec<String>, sort: Option<&SortSpec>) -> Vec<String> {
    match sort {
        None => names,
        Some(spec) => {
            names.sort();
            if !spec.ascending {
                names.reverse();
            }
            names
        }
    }
}

fn sort_survivors(
    facade: &dyn RegistryFacade,
    survivors: &mut [(String, Arc<UpstreamPackage>)],
    sort: &SortSpec,
) {
    survivors.sort_by(|(a_name, a_pkg), (b_name, b_pkg)| {
        let ordering = match sort.field.as_str() {
            "name" => a_name.cmp(b_name),
            "version" => {
                let a = a_pkg.default_version.as_deref().unwrap_or("");
                let b = b_pkg.default_version.as_deref().unwrap_or("");
                facade.compare_versions(a, b)
            }
            field => {
                let a = a_pkg.attr_str(field).unwrap_or("");
                let b = b_pkg.attr_str(field).unwrap_or("");
                a.cmp(b).then_with(|| a_name.cmp(b_name))
            }
        };
        if sort.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockFacade {
        packages: HashMap<String, Arc<UpstreamPackage>>,
        search_results: Vec<String>,
        fetches: AtomicUsize,
        searches: AtomicUsize,
    }

    impl MockFacade {
        fn new(names: &[(&str, &str)]) -> Self {
            let packages = names
                .iter()
                .map(|(name, description)| {
                    let mut attributes = Map::new();
                    attributes.insert(
                        "description".into(),
                        Value::String((*description).to_string()),
                    );
                    attributes.insert(
                        "keywords".into(),
                        serde_json::json!(["web", name]),
                    );
                    let pkg = UpstreamPackage {
                        name: (*name).to_string(),
                        resource_id: name.to_lowercase(),
                        default_version: Some("1.0.0".into()),
                        versions: vec![],
                        attributes,
                    };
                    ((*name).to_string(), Arc::new(pkg))
                })
                .collect();
            Self {
                packages,
                search_results: Vec::new(),
                fetches: AtomicUsize::new(0),
                searches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RegistryFacade for MockFacade {
        fn group_type(&self) -> &'static str {
            "mockregistries"
        }
        fn group_singular(&self) -> &'static str {
            "mockregistry"
        }
        fn group_id(&self) -> &str {
            "mock.example"
        }
        fn resource_plural(&self) -> &'static str {
            "packages"
        }
        fn resource_singular(&self) -> &'static str {
            "package"
        }
        fn upstream_origin(&self) -> &str {
            "https://mock.example"
        }
        fn package_count_estimate(&self) -> u64 {
            self.packages.len() as u64
        }
        fn normalize(&self, name: &str) -> String {
            name.to_lowercase()
        }
        fn compare_versions(&self, a: &str, b: &str) -> std::cmp::Ordering {
            a.cmp(b)
        }
        async fn package(&self, name: &str) -> Result<Arc<UpstreamPackage>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.packages
                .get(name)
                .cloned()
                .ok_or_else(|| FacadeError::NotFound(name.to_string()))
        }
        async fn search_names(&self, _query: &str, limit: usize) -> Result<Vec<String>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(self.search_results.iter().take(limit).cloned().collect())
        }
        fn model(&self) -> Value {
            serde_json::json!({})
        }
        fn cache_stats(&self) -> CacheStats {
            CacheStats {
                hits: 0,
                misses: 0,
                size: 0,
                evictions: 0,
            }
        }
    }

    fn ready_engine(names: &[&str]) -> FilterEngine {
        let index = Arc::new(NameIndex::new());
        index.install(names.iter().map(ToString::to_string).collect());
        FilterEngine::new(index, FilterConfig::default())
    }

    fn page(limit: usize, offset: usize) -> Page {
        Page { limit, offset }
    }

    #[test]
    fn test_parse_basic_clause() {
        let expr = FilterExpr::parse("name=react").unwrap();
        assert_eq!(expr.clauses.len(), 1);
        assert_eq!(expr.clauses[0].field, FilterField::Name);
        assert_eq!(expr.clauses[0].op, FilterOp::Eq);
    }

    #[test]
    fn test_parse_joined_clauses_and_ne() {
        let expr = FilterExpr::parse("name=react*&license!=MIT").unwrap();
        assert_eq!(expr.clauses.len(), 2);
        assert_eq!(expr.clauses[1].op, FilterOp::Ne);
    }

    #[test]
    fn test_parse_rejects_unknown_field() {
        let err = FilterExpr::parse("size=big").unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_parse_rejects_missing_comparator() {
        assert!(FilterExpr::parse("name").is_err());
        assert!(FilterExpr::parse("").is_err());
    }

    #[test]
    fn test_wildcard_is_anchored_and_case_insensitive() {
        let expr = FilterExpr::parse("name=React*").unwrap();
        let clause = &expr.clauses[0];
        assert!(clause.matches_name("react-dom"));
        assert!(clause.matches_name("REACT"));
        assert!(!clause.matches_name("preact"));

        let inner = FilterExpr::parse("name=*act*").unwrap();
        assert!(inner.clauses[0].matches_name("preact"));
        assert!(!inner.clauses[0].matches_name("vue"));
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let expr = FilterExpr::parse("name=Express").unwrap();
        assert!(expr.clauses[0].matches_name("express"));
        assert!(!expr.clauses[0].matches_name("expressjs"));
    }

    #[tokio::test]
    async fn test_name_only_filter_never_fetches_metadata() {
        let facade = MockFacade::new(&[("react", "ui"), ("react-dom", "ui"), ("vue", "ui")]);
        let engine = ready_engine(&["react", "react-dom", "vue"]);
        let expr = FilterExpr::parse("name=react*").unwrap();

        let outcome = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();

        assert_eq!(outcome.hits.len(), 2);
        assert!(!outcome.enriched);
        assert_eq!(facade.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_two_step_enrichment_applies_meta_clauses() {
        let facade = MockFacade::new(&[
            ("react", "ui library"),
            ("react-dom", "dom renderer"),
            ("react-router", "ui router"),
        ]);
        let engine = ready_engine(&["react", "react-dom", "react-router"]);
        let expr = FilterExpr::parse("name=react*&description=*ui*").unwrap();

        let outcome = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();

        let names: Vec<&str> = outcome.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["react", "react-router"]);
        assert!(outcome.enriched);
        assert!(outcome.hits.iter().all(|h| h.package.is_some()));
    }

    #[tokio::test]
    async fn test_fan_out_respects_hard_cap() {
        let entries: Vec<(String, String)> = (0..50)
            .map(|i| (format!("pkg{i:03}"), "desc".to_string()))
            .collect();
        let borrowed: Vec<(&str, &str)> = entries
            .iter()
            .map(|(n, d)| (n.as_str(), d.as_str()))
            .collect();
        let facade = MockFacade::new(&borrowed);

        let index = Arc::new(NameIndex::new());
        index.install(entries.iter().map(|(n, _)| n.clone()).collect());
        let engine = FilterEngine::new(
            index,
            FilterConfig {
                max_metadata_fetches: 5,
                concurrency: 2,
                ..FilterConfig::default()
            },
        );

        let expr = FilterExpr::parse("name=pkg*&description=*nothing*").unwrap();
        let outcome = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();

        assert!(outcome.hits.is_empty());
        assert!(facade.fetch_count() <= 5);
    }

    #[tokio::test]
    async fn test_short_circuit_stops_early() {
        let entries: Vec<(String, String)> = (0..40)
            .map(|i| (format!("pkg{i:03}"), "match".to_string()))
            .collect();
        let borrowed: Vec<(&str, &str)> = entries
            .iter()
            .map(|(n, d)| (n.as_str(), d.as_str()))
            .collect();
        let facade = MockFacade::new(&borrowed);

        let index = Arc::new(NameIndex::new());
        index.install(entries.iter().map(|(n, _)| n.clone()).collect());
        let engine = FilterEngine::new(
            index,
            FilterConfig {
                concurrency: 4,
                ..FilterConfig::default()
            },
        );

        let expr = FilterExpr::parse("name=pkg*&description=match").unwrap();
        let outcome = engine
            .evaluate(&facade, &expr, page(1, 0), None)
            .await
            .unwrap();

        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].name, "pkg000");
        // Early termination: far fewer fetches than candidates, though
        // the buffered stream may have a few extra in flight.
        assert!(facade.fetch_count() <= 8);
    }

    #[tokio::test]
    async fn test_failed_fetch_drops_only_that_candidate() {
        let facade = MockFacade::new(&[("react", "ui"), ("react-router", "ui")]);
        // "react-native" is indexed but the mock has no metadata for it,
        // so its fetch fails.
        let engine = ready_engine(&["react", "react-native", "react-router"]);
        let expr = FilterExpr::parse("name=react*&description=ui").unwrap();

        let outcome = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();

        let names: Vec<&str> = outcome.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["react", "react-router"]);
    }

    #[tokio::test]
    async fn test_prefix_candidates_come_first() {
        let facade = MockFacade::new(&[]);
        let engine = ready_engine(&["act", "preact", "react", "react-dom"]);
        let expr = FilterExpr::parse("name=react*").unwrap();

        let outcome = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();
        let names: Vec<&str> = outcome.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["react", "react-dom"]);
    }

    #[tokio::test]
    async fn test_fallback_uses_upstream_search_when_index_not_ready() {
        let mut facade = MockFacade::new(&[]);
        facade.search_results = vec!["react".into(), "react-dom".into(), "redux".into()];
        let engine = FilterEngine::new(Arc::new(NameIndex::new()), FilterConfig::default());
        let expr = FilterExpr::parse("name=react*").unwrap();

        let outcome = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();

        let names: Vec<&str> = outcome.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["react", "react-dom"]);
        assert_eq!(facade.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_result_cache_short_circuits_repeat_queries() {
        let facade = MockFacade::new(&[("react", "ui"), ("react-dom", "ui")]);
        let engine = ready_engine(&["react", "react-dom"]);
        let expr = FilterExpr::parse("name=react*&description=ui").unwrap();

        engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();
        let first_fetches = facade.fetch_count();

        let again = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();

        assert_eq!(facade.fetch_count(), first_fetches);
        assert_eq!(again.hits.len(), 2);
        assert!(again.enriched);
    }

    #[tokio::test]
    async fn test_sort_desc_orders_whole_set_before_slicing() {
        let facade = MockFacade::new(&[]);
        let engine = ready_engine(&["axios", "express", "react", "vue"]);
        let expr = FilterExpr::parse("name=*").unwrap();
        let sort = SortSpec::parse("name=desc").unwrap();

        let outcome = engine
            .evaluate(&facade, &expr, page(2, 0), Some(&sort))
            .await
            .unwrap();
        let names: Vec<&str> = outcome.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["vue", "react"]);
    }

    #[tokio::test]
    async fn test_listing_slices_index_deterministically() {
        let facade = MockFacade::new(&[]);
        let engine = ready_engine(&["c", "a", "b", "d"]);

        let outcome = engine
            .evaluate_listing(&facade, page(2, 1), None)
            .await
            .unwrap();
        let names: Vec<&str> = outcome.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(facade.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_listing_falls_back_to_sample_search() {
        let mut facade = MockFacade::new(&[]);
        facade.search_results = vec!["beta".into(), "alpha".into()];
        let engine = FilterEngine::new(Arc::new(NameIndex::new()), FilterConfig::default());

        let outcome = engine.evaluate_listing(&facade, page(5, 0), None).await.unwrap();
        let names: Vec<&str> = outcome.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(facade.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ne_clause_on_absent_attribute_matches() {
        let facade = MockFacade::new(&[("react", "ui")]);
        let engine = ready_engine(&["react"]);
        // The mock never sets a license, so license!=MIT holds.
        let expr = FilterExpr::parse("name=react&license!=MIT").unwrap();

        let outcome = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();
        assert_eq!(outcome.hits.len(), 1);
    }

    #[tokio::test]
    async fn test_keywords_clause_matches_any_element() {
        let facade = MockFacade::new(&[("react", "ui"), ("vue", "ui")]);
        let engine = ready_engine(&["react", "vue"]);
        let expr = FilterExpr::parse("name=*&keywords=react").unwrap();

        let outcome = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();
        let names: Vec<&str> = outcome.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["react"]);
    }

    #[tokio::test]
    async fn test_wildcard_matching_nothing_yields_empty_page() {
        let facade = MockFacade::new(&[]);
        let engine = ready_engine(&["react", "vue"]);
        let expr = FilterExpr::parse("name=zzz*").unwrap();

        let outcome = engine
            .evaluate(&facade, &expr, page(10, 0), None)
            .await
            .unwrap();
        assert!(outcome.hits.is_empty());
    }
}
