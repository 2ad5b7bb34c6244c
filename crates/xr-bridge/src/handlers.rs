//! Path-space handlers for the registry surface.
//!
//! Each handler parses the typed request flags, resolves the facade
//! for the group plural, shapes the response document and runs it
//! through the URL rewriter before it leaves the process.

use crate::problem::Problem;
use crate::state::AppState;
use crate::trace::TraceContext;
use axum::body::Body;
use axum::extract::{FromRequestParts, OriginalUri, Path, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use xr_core::facade::UpstreamPackage;
use xr_core::filter::{FilterExpr, FilterOutcome};
use xr_core::flags::{RequestFlags, query_pairs};
use xr_core::page::{Page, next_link};
use xr_core::registry_set::FacadeContext;
use xr_core::rewrite;
use xr_core::shape;

/// Per-request context assembled once per handler: typed flags, page,
/// trace ids, and the bridge-visible base URL.
pub struct ReqCtx {
    pub base: String,
    pub flags: RequestFlags,
    pub page: Page,
    pub pairs: Vec<(String, String)>,
    pub trace: TraceContext,
    pub path: String,
    pub instance: String,
}

impl FromRequestParts<Arc<AppState>> for ReqCtx {
    type Rejection = Problem;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let trace = parts
            .extensions
            .get::<TraceContext>()
            .cloned()
            .unwrap_or_else(TraceContext::mint);

        let path = parts.uri.path().to_string();
        let instance = match parts.uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.clone(),
        };

        let pairs = query_pairs(parts.uri.query().unwrap_or(""));
        let flags = RequestFlags::from_pairs(&pairs)
            .map_err(|e| Problem::from_error(&e, &instance, &trace))?;
        let page = Page::from_pairs(&pairs)
            .map_err(|e| Problem::from_error(&e, &instance, &trace))?;
        let base = base_url(state, &parts.headers);

        Ok(Self {
            base,
            flags,
            page,
            pairs,
            trace,
            path,
            instance,
        })
    }
}

/// Bridge-visible base URL: `XREGISTRY_BASEURL` override, else the
/// forwarded headers, else the `Host` header, with the API path prefix
/// appended.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.config.base_url {
        return base.clone();
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    };
    let proto = header("x-forwarded-proto").unwrap_or("http");
    let fallback = format!("localhost:{}", state.config.port);
    let host = header("x-forwarded-host")
        .or_else(|| header("host"))
        .unwrap_or(&fallback);

    format!("{proto}://{host}{}", state.config.api_path_prefix)
}

/// Serializes a shaped document: upstream origins are substituted with
/// the facade-scoped bridge base (skipping `xid` members), and the
/// schema-tagged content type plus the registry version header are
/// attached.
fn respond(
    mut value: Value,
    facade: Option<&FacadeContext>,
    base: &str,
    mut link: Option<String>,
) -> Response {
    if let Some(ctx) = facade {
        let facade_base = format!("{base}{}", shape::group_xid(ctx));
        rewrite::rewrite_value(&mut value, ctx.facade.upstream_origin(), &facade_base);
        link = link.map(|l| {
            rewrite::rewrite_link_header(&l, ctx.facade.upstream_origin(), &facade_base)
        });
    }

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, shape::CONTENT_TYPE)
        .header("xregistry-version", shape::SPEC_VERSION);
    if let Some(link) = link {
        builder = builder.header(header::LINK, link);
    }
    builder
        .body(Body::from(value.to_string()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn resolve<'a>(
    state: &'a AppState,
    group: &str,
    ctx: &ReqCtx,
) -> Result<&'a Arc<FacadeContext>, Problem> {
    state.set.get(group).ok_or_else(|| {
        Problem::not_found(&ctx.instance, &ctx.trace).with_extension("groupType", json!(group))
    })
}

fn ensure_coordinates(
    fctx: &FacadeContext,
    gid: &str,
    resources: Option<&str>,
    ctx: &ReqCtx,
) -> Result<(), Problem> {
    if gid != fctx.facade.group_id() {
        return Err(Problem::not_found(&ctx.instance, &ctx.trace));
    }
    if let Some(resources) = resources {
        if resources != fctx.facade.resource_plural() {
            return Err(Problem::not_found(&ctx.instance, &ctx.trace));
        }
    }
    Ok(())
}

/// Upstream-flavored problem: carries the group type so 502 bodies can
/// say which facade failed.
fn upstream_problem(
    err: &xr_core::error::FacadeError,
    fctx: &FacadeContext,
    ctx: &ReqCtx,
) -> Problem {
    Problem::from_error(err, &ctx.instance, &ctx.trace)
        .with_extension("groupType", json!(fctx.facade.group_type()))
        .with_extension("error", json!(err.title()))
        .with_extension("message", json!(err.to_string()))
}

async fn fetch_package(
    fctx: &FacadeContext,
    name: &str,
    ctx: &ReqCtx,
) -> Result<Arc<UpstreamPackage>, Problem> {
    fctx.facade
        .package(name)
        .await
        .map_err(|e| upstream_problem(&e, fctx, ctx))
}

// ---------------------------------------------------------------------
// Root documents

pub async fn registry_root(State(state): State<Arc<AppState>>, ctx: ReqCtx) -> Response {
    let doc = shape::registry_doc(&state.set, &ctx.base, &state.config.registry_id, &ctx.flags);
    respond(doc, None, &ctx.base, None)
}

pub async fn model(State(state): State<Arc<AppState>>, ctx: ReqCtx) -> Response {
    respond(shape::model_doc(&state.set), None, &ctx.base, None)
}

pub async fn capabilities(_state: State<Arc<AppState>>, ctx: ReqCtx) -> Response {
    respond(shape::capabilities_doc(), None, &ctx.base, None)
}

pub async fn export(_state: State<Arc<AppState>>, ctx: ReqCtx) -> Response {
    let location = format!("{}/?doc&inline=*,capabilities,modelsource", ctx.base);
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let facades: Vec<&str> = state.set.iter().map(|c| c.facade.group_type()).collect();
    let body = json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "facades": facades,
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

pub async fn performance_stats(State(state): State<Arc<AppState>>) -> Response {
    let mut facades = Map::new();
    for fctx in state.set.iter() {
        facades.insert(
            fctx.facade.group_type().to_string(),
            json!({
                "cache": fctx.facade.cache_stats(),
                "index": {
                    "ready": fctx.index.is_ready(),
                    "names": fctx.index.len(),
                },
            }),
        );
    }
    let body = json!({
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "facades": facades,
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

// ---------------------------------------------------------------------
// Groups

pub async fn group_collection(
    State(state): State<Arc<AppState>>,
    Path(group): Path<String>,
    ctx: ReqCtx,
) -> Result<Response, Problem> {
    let fctx = resolve(&state, &group, &ctx)?;
    let doc = shape::group_collection_doc(fctx, &ctx.base);
    Ok(respond(doc, Some(fctx), &ctx.base, None))
}

pub async fn group_one(
    State(state): State<Arc<AppState>>,
    Path((group, gid)): Path<(String, String)>,
    ctx: ReqCtx,
) -> Result<Response, Problem> {
    let fctx = resolve(&state, &group, &ctx)?;
    ensure_coordinates(fctx, &gid, None, &ctx)?;
    let doc = shape::group_doc(fctx, &ctx.base);
    Ok(respond(doc, Some(fctx), &ctx.base, None))
}

// ---------------------------------------------------------------------
// Resources

pub async fn resources_list(
    State(state): State<Arc<AppState>>,
    Path((group, gid, resources)): Path<(String, String, String)>,
    ctx: ReqCtx,
) -> Result<Response, Problem> {
    let fctx = resolve(&state, &group, &ctx)?;
    ensure_coordinates(fctx, &gid, Some(&resources), &ctx)?;

    let sort = ctx.flags.sort.clone();
    let outcome: FilterOutcome = match &ctx.flags.filter {
        Some(raw) => {
            let expr =
                FilterExpr::parse(raw).map_err(|e| Problem::from_error(&e, &ctx.instance, &ctx.trace))?;
            fctx.filter
                .evaluate(fctx.facade.as_ref(), &expr, ctx.page, sort.as_ref())
                .await
                .map_err(|e| upstream_problem(&e, fctx, &ctx))?
        }
        None => fctx
            .filter
            .evaluate_listing(fctx.facade.as_ref(), ctx.page, sort.as_ref())
            .await
            .map_err(|e| upstream_problem(&e, fctx, &ctx))?,
    };

    let mut entries = Map::new();
    for hit in &outcome.hits {
        // A cached enriched result comes back without package data;
        // rehydrate from the (warm) upstream cache.
        let pkg = match (&hit.package, outcome.enriched) {
            (Some(pkg), _) => Some(Arc::clone(pkg)),
            (None, true) => fctx.facade.package(&hit.name).await.ok(),
            (None, false) => None,
        };
        entries.insert(
            hit.name.clone(),
            shape::resource_entry_doc(fctx, &ctx.base, &hit.name, pkg.as_deref()),
        );
    }

    let more_may_exist = if ctx.flags.filter.is_some() {
        !outcome.hits.is_empty()
    } else {
        outcome.hits.len() == ctx.page.limit
    };
    let link = more_may_exist.then(|| next_link(&ctx.base, &ctx.path, &ctx.pairs, ctx.page));

    Ok(respond(Value::Object(entries), Some(fctx), &ctx.base, link))
}

pub async fn resource_one(
    State(state): State<Arc<AppState>>,
    Path((group, gid, resources, rid)): Path<(String, String, String, String)>,
    ctx: ReqCtx,
) -> Result<Response, Problem> {
    let fctx = resolve(&state, &group, &ctx)?;
    ensure_coordinates(fctx, &gid, Some(&resources), &ctx)?;

    let pkg = fetch_package(fctx, &rid, &ctx).await?;
    let doc = shape::resource_doc(fctx, &ctx.base, &pkg);
    Ok(respond(doc, Some(fctx), &ctx.base, None))
}

pub async fn resource_meta(
    State(state): State<Arc<AppState>>,
    Path((group, gid, resources, rid)): Path<(String, String, String, String)>,
    ctx: ReqCtx,
) -> Result<Response, Problem> {
    let fctx = resolve(&state, &group, &ctx)?;
    ensure_coordinates(fctx, &gid, Some(&resources), &ctx)?;

    let pkg = fetch_package(fctx, &rid, &ctx).await?;
    let doc = shape::resource_meta_doc(fctx, &ctx.base, &pkg);
    Ok(respond(doc, Some(fctx), &ctx.base, None))
}

// ---------------------------------------------------------------------
// Versions

pub async fn versions_list(
    State(state): State<Arc<AppState>>,
    Path((group, gid, resources, rid)): Path<(String, String, String, String)>,
    ctx: ReqCtx,
) -> Result<Response, Problem> {
    let fctx = resolve(&state, &group, &ctx)?;
    ensure_coordinates(fctx, &gid, Some(&resources), &ctx)?;

    let pkg = fetch_package(fctx, &rid, &ctx).await?;
    let doc = shape::versions_doc(fctx, &ctx.base, &pkg);
    Ok(respond(doc, Some(fctx), &ctx.base, None))
}

pub async fn version_one(
    State(state): State<Arc<AppState>>,
    Path((group, gid, resources, rid, vid)): Path<(String, String, String, String, String)>,
    ctx: ReqCtx,
) -> Result<Response, Problem> {
    let fctx = resolve(&state, &group, &ctx)?;
    ensure_coordinates(fctx, &gid, Some(&resources), &ctx)?;

    let pkg = fetch_package(fctx, &rid, &ctx).await?;
    let version = pkg
        .version(&vid)
        .ok_or_else(|| Problem::not_found(&ctx.instance, &ctx.trace))?;
    let doc = shape::version_doc(fctx, &ctx.base, &pkg, version);
    Ok(respond(doc, Some(fctx), &ctx.base, None))
}

pub async fn version_meta(
    State(state): State<Arc<AppState>>,
    Path((group, gid, resources, rid, vid)): Path<(String, String, String, String, String)>,
    ctx: ReqCtx,
) -> Result<Response, Problem> {
    let fctx = resolve(&state, &group, &ctx)?;
    ensure_coordinates(fctx, &gid, Some(&resources), &ctx)?;

    let pkg = fetch_package(fctx, &rid, &ctx).await?;
    let version = pkg
        .version(&vid)
        .ok_or_else(|| Problem::not_found(&ctx.instance, &ctx.trace))?;
    let doc = shape::version_meta_doc(fctx, &ctx.base, &pkg, version);
    Ok(respond(doc, Some(fctx), &ctx.base, None))
}

// ---------------------------------------------------------------------
// Fallbacks

/// Mutating verbs on any route: the registry is read-only.
pub async fn method_not_allowed(
    method: Method,
    OriginalUri(uri): OriginalUri,
    trace: Option<Extension<TraceContext>>,
) -> Problem {
    let trace = trace.map(|e| e.0).unwrap_or_else(TraceContext::mint);
    Problem::method_not_allowed(method.as_str(), uri.path(), &trace)
}

pub async fn not_found(
    OriginalUri(uri): OriginalUri,
    trace: Option<Extension<TraceContext>>,
) -> Problem {
    let trace = trace.map(|e| e.0).unwrap_or_else(TraceContext::mint);
    Problem::not_found(uri.path(), &trace)
}
