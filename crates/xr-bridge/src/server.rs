//! Router assembly: routes, method policy, CORS, auth and tracing
//! layers.

use crate::handlers;
use crate::problem::Problem;
use crate::state::AppState;
use crate::trace::{self, TraceContext};
use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, Method, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// A GET-only route: every other verb lands on the read-only 405
/// problem handler.
fn get_only<H, T>(handler: H) -> MethodRouter<Arc<AppState>>
where
    H: axum::handler::Handler<T, Arc<AppState>>,
    T: 'static,
{
    get(handler).fallback(handlers::method_not_allowed)
}

/// Permissive CORS for a public read-only surface: any origin, the
/// standard methods, and the tracing/navigation headers exposed.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::OPTIONS,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-base-url"),
            HeaderName::from_static("x-correlation-id"),
            HeaderName::from_static("x-trace-id"),
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([
            header::LINK,
            header::ETAG,
            header::LOCATION,
            HeaderName::from_static("xregistry-version"),
            HeaderName::from_static("x-trace-id"),
            HeaderName::from_static("x-correlation-id"),
        ])
}

/// Bearer-token gate, active only when an API key is configured.
///
/// `OPTIONS` stays open for CORS preflight; `/model` stays open from
/// loopback so local tooling can introspect the schema.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_key.clone() else {
        return next.run(request).await;
    };
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }
    if request.uri().path() == "/model" {
        let loopback = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().is_loopback())
            .unwrap_or(false);
        if loopback {
            return next.run(request).await;
        }
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected);

    if authorized {
        next.run(request).await
    } else {
        let trace = request
            .extensions()
            .get::<TraceContext>()
            .cloned()
            .unwrap_or_else(TraceContext::mint);
        Problem::new(
            401,
            "Unauthorized",
            "missing or invalid bearer token",
            request.uri().path(),
            &trace,
        )
        .into_response()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get_only(handlers::registry_root))
        .route("/model", get_only(handlers::model))
        .route("/capabilities", get_only(handlers::capabilities))
        .route("/export", get_only(handlers::export))
        .route("/health", get_only(handlers::health))
        .route("/performance/stats", get_only(handlers::performance_stats))
        .route("/{group}", get_only(handlers::group_collection))
        .route("/{group}/{gid}", get_only(handlers::group_one))
        .route(
            "/{group}/{gid}/{resources}",
            get_only(handlers::resources_list),
        )
        .route(
            "/{group}/{gid}/{resources}/{rid}",
            get_only(handlers::resource_one),
        )
        .route(
            "/{group}/{gid}/{resources}/{rid}/meta",
            get_only(handlers::resource_meta),
        )
        .route(
            "/{group}/{gid}/{resources}/{rid}/versions",
            get_only(handlers::versions_list),
        )
        .route(
            "/{group}/{gid}/{resources}/{rid}/versions/{vid}",
            get_only(handlers::version_one),
        )
        .route(
            "/{group}/{gid}/{resources}/{rid}/versions/{vid}/meta",
            get_only(handlers::version_meta),
        )
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        .layer(middleware::from_fn(trace::trace_middleware))
        .layer(cors_layer())
        .with_state(state)
}
