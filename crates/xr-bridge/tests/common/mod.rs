//! Shared harness for bridge integration tests: a mock npm upstream
//! behind a full router, with a pre-installed name index.
#![allow(dead_code)]

use axum_test::TestServer;
use std::sync::Arc;
use xr_bridge::{AppState, BridgeConfig, build_router};
use xr_core::cache::{CacheConfig, CacheManager};
use xr_core::filter::FilterConfig;
use xr_core::registry_set::{FacadeContext, FacadeSet};
use xr_npm::NpmFacade;

/// Stable bridge origin for URL assertions.
pub const BRIDGE_BASE: &str = "https://bridge.example";

pub struct TestBridge {
    pub server: TestServer,
    pub upstream: mockito::ServerGuard,
}

/// Builds a bridge hosting only the npm facade, pointed at a mockito
/// upstream, with `names` installed in the index synchronously.
pub async fn npm_bridge(names: &[&str]) -> TestBridge {
    npm_bridge_with_config(names, BridgeConfig::default()).await
}

pub async fn npm_bridge_with_config(names: &[&str], mut config: BridgeConfig) -> TestBridge {
    let upstream = mockito::Server::new_async().await;

    config.base_url = Some(BRIDGE_BASE.to_string());

    let cache = Arc::new(CacheManager::new(CacheConfig::default()));
    let facade = Arc::new(NpmFacade::new(Arc::clone(&cache), upstream.url()));
    let ctx = FacadeContext::new(facade, cache, FilterConfig::default());
    if !names.is_empty() {
        ctx.index.install(names.iter().map(ToString::to_string).collect());
    }

    let mut set = FacadeSet::new();
    set.insert(ctx);

    let state = Arc::new(AppState::new(set, config));
    let server = TestServer::new(build_router(state)).expect("router must build");

    TestBridge { server, upstream }
}

/// A package document in the npm registry shape, with tarball URLs on
/// the given upstream origin.
pub fn express_doc(upstream: &str) -> String {
    serde_json::json!({
        "name": "express",
        "description": "Fast, unopinionated web framework",
        "license": "MIT",
        "homepage": "http://expressjs.com/",
        "keywords": ["framework", "web"],
        "dist-tags": {"latest": "4.18.2"},
        "time": {
            "4.0.0": "2014-04-09T19:00:00Z",
            "4.17.1": "2019-05-26T05:01:03Z",
            "4.18.2": "2022-10-08T15:44:43Z"
        },
        "versions": {
            "4.0.0": {
                "version": "4.0.0",
                "license": "MIT",
                "dist": {"tarball": format!("{upstream}/express/-/express-4.0.0.tgz")}
            },
            "4.17.1": {
                "version": "4.17.1",
                "license": "MIT",
                "dist": {"tarball": format!("{upstream}/express/-/express-4.17.1.tgz")}
            },
            "4.18.2": {
                "version": "4.18.2",
                "license": "MIT",
                "dependencies": {"accepts": "~1.3.8"},
                "dist": {
                    "tarball": format!("{upstream}/express/-/express-4.18.2.tgz"),
                    // Deliberately named like the canonical id field to
                    // prove the rewriter skips it.
                    "xid": format!("{upstream}/express/should-not-change")
                }
            }
        }
    })
    .to_string()
}

/// A minimal package document with one version.
pub fn small_doc(name: &str, version: &str, description: &str) -> String {
    let mut versions = serde_json::Map::new();
    versions.insert(
        version.to_string(),
        serde_json::json!({"version": version, "description": description}),
    );
    serde_json::json!({
        "name": name,
        "description": description,
        "dist-tags": {"latest": version},
        "versions": versions
    })
    .to_string()
}
