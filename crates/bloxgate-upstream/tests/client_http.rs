// crates/bloxgate-upstream/tests/client_http.rs
// ============================================================================
// Module: Upstream Client HTTP Tests
// Description: Loopback integration tests for the reqwest transport.
// Purpose: Verify auth, query, quirk, and classification behavior on a wire.
// Dependencies: axum, tokio
// ============================================================================

#![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

use std::net::SocketAddr;

use axum::Router;
use axum::extract::Query;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::routing::delete;
use axum::routing::get;
use bloxgate_upstream::ServiceKind;
use bloxgate_upstream::UpstreamClient;
use bloxgate_upstream::UpstreamError;
use bloxgate_upstream::UpstreamTransport;
use serde_json::json;

/// Starts a loopback upstream double and returns its base URL.
async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn list_call_sends_token_auth_and_query() {
    let router = Router::new().route(
        "/api/ddi/v1/ipam/ip_space",
        get(
            |headers: HeaderMap, Query(params): Query<Vec<(String, String)>>| async move {
                assert_eq!(headers.get("authorization").unwrap(), "Token secret-key");
                assert!(params.contains(&("_limit".to_string(), "10".to_string())));
                assert!(params.contains(&("_filter".to_string(), "name=='lab'".to_string())));
                axum::Json(json!({"results": []}))
            },
        ),
    );
    let base = spawn_upstream(router).await;
    let client = UpstreamClient::new(&base, "secret-key").unwrap();
    let request = UpstreamClient::list_collection(
        ServiceKind::InfobloxApi,
        "/ipam/ip_space",
        Some("name=='lab'"),
        10,
    );
    let response = client.send(&request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({"results": []}));
}

#[tokio::test]
async fn delete_goes_out_without_content_type() {
    let router = Router::new().route(
        "/api/ddi/v1/ipam/subnet/ipam/subnet/abc",
        delete(|headers: HeaderMap| async move {
            assert!(headers.get("content-type").is_none());
            StatusCode::NO_CONTENT
        }),
    );
    let base = spawn_upstream(router).await;
    let client = UpstreamClient::new(&base, "secret-key").unwrap();
    let request =
        UpstreamClient::delete_resource(ServiceKind::InfobloxApi, "/ipam/subnet", "ipam/subnet/abc");
    let response = client.send(&request).await.unwrap();
    assert_eq!(response.status, 204);
    assert_eq!(response.body, json!({"success": true}));
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let router = Router::new().route(
        "/api/universalinfra/v1/consolidated/configure",
        axum::routing::post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", "2")],
                axum::Json(json!({"error": "busy"})),
            )
        }),
    );
    let base = spawn_upstream(router).await;
    let client = UpstreamClient::new(&base, "secret-key").unwrap();
    let request = UpstreamClient::consolidated_configure(json!({"universal_service": {}}));
    let err = client.send(&request).await.unwrap_err();
    match err {
        UpstreamError::RateLimited {
            retry_after,
        } => assert_eq!(retry_after.unwrap().as_secs(), 2),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_keep_the_body() {
    let router = Router::new().route(
        "/api/ddi/v1/dns/auth_zone",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({"why": "db"}))) }),
    );
    let base = spawn_upstream(router).await;
    let client = UpstreamClient::new(&base, "secret-key").unwrap();
    let request = UpstreamClient::list_collection(ServiceKind::InfobloxApi, "/dns/auth_zone", None, 100);
    let err = client.send(&request).await.unwrap_err();
    match err {
        UpstreamError::ServerError {
            status,
            body,
        } => {
            assert_eq!(status, 500);
            assert_eq!(body, json!({"why": "db"}));
        }
        other => panic!("expected ServerError, got {other:?}"),
    }
}

#[tokio::test]
async fn connection_refused_classifies_as_transport() {
    let client = UpstreamClient::new("http://127.0.0.1:1", "secret-key").unwrap();
    let request = UpstreamClient::list_collection(ServiceKind::AtcfwApi, "/security_policies", None, 5);
    let err = client.send(&request).await.unwrap_err();
    assert!(matches!(
        err,
        UpstreamError::Transport {
            ..
        }
    ));
}
