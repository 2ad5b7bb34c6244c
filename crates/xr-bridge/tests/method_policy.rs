//! Method policy, flag validation and auth behavior.

mod common;

use common::npm_bridge;
use serde_json::Value;
use xr_bridge::BridgeConfig;

#[tokio::test]
async fn mutating_verbs_are_405_problems() {
    let bridge = npm_bridge(&[]).await;

    let post = bridge
        .server
        .post("/noderegistries/npmjs.org/packages")
        .await;
    assert_eq!(post.status_code(), 405);
    let body: Value = post.json();
    assert_eq!(body["title"], "Method Not Allowed");
    assert_eq!(body["status"], 405);
    assert!(body["detail"].as_str().unwrap().contains("read-only"));

    let put = bridge.server.put("/noderegistries/npmjs.org").await;
    assert_eq!(put.status_code(), 405);

    let delete = bridge
        .server
        .delete("/noderegistries/npmjs.org/packages/express")
        .await;
    assert_eq!(delete.status_code(), 405);

    let patch = bridge.server.patch("/").await;
    assert_eq!(patch.status_code(), 405);
}

#[tokio::test]
async fn unknown_route_is_404_problem() {
    let bridge = npm_bridge(&[]).await;
    let response = bridge.server.get("/not/a/registry/route/at/all/nope").await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["title"], "Not Found");
    assert!(body["traceId"].as_str().is_some());
}

#[tokio::test]
async fn unknown_group_is_404_problem() {
    let bridge = npm_bridge(&[]).await;
    let response = bridge.server.get("/rubyregistries").await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["groupType"], "rubyregistries");
}

#[tokio::test]
async fn wrong_group_id_is_404() {
    let bridge = npm_bridge(&[]).await;
    let response = bridge.server.get("/noderegistries/not-npm.example").await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn limit_zero_is_400_problem() {
    let bridge = npm_bridge(&["react"]).await;
    let response = bridge
        .server
        .get("/noderegistries/npmjs.org/packages")
        .add_query_param("limit", "0")
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["title"], "Bad Request");
}

#[tokio::test]
async fn unknown_query_flag_is_400() {
    let bridge = npm_bridge(&[]).await;
    let response = bridge
        .server
        .get("/")
        .add_query_param("frobnicate", "yes")
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn malformed_filter_field_is_400() {
    let bridge = npm_bridge(&["react"]).await;
    let response = bridge
        .server
        .get("/noderegistries/npmjs.org/packages")
        .add_query_param("filter", "size=big")
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn bearer_auth_gates_requests_when_configured() {
    let config = BridgeConfig {
        api_key: Some("sekret".into()),
        ..BridgeConfig::default()
    };
    let bridge = common::npm_bridge_with_config(&[], config).await;

    let denied = bridge.server.get("/").await;
    assert_eq!(denied.status_code(), 401);
    let body: Value = denied.json();
    assert_eq!(body["title"], "Unauthorized");

    let wrong = bridge
        .server
        .get("/")
        .add_header("authorization", "Bearer wrong")
        .await;
    assert_eq!(wrong.status_code(), 401);

    let allowed = bridge
        .server
        .get("/")
        .add_header("authorization", "Bearer sekret")
        .await;
    assert_eq!(allowed.status_code(), 200);
}

#[tokio::test]
async fn cors_headers_are_present_on_errors_too() {
    let bridge = npm_bridge(&[]).await;
    let response = bridge
        .server
        .post("/noderegistries")
        .add_header("origin", "https://app.example")
        .await;

    assert_eq!(response.status_code(), 405);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}
