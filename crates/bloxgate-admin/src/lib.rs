// crates/bloxgate-admin/src/lib.rs
// ============================================================================
// Module: Admin Surface
// Description: Second listener exposing metrics and health.
// Purpose: Serve scrapers and probes without touching the RPC port.
// Dependencies: axum, bloxgate-observe, bloxgate-resilience
// ============================================================================

//! ## Overview
//! Four read-only routes on a dedicated port: an index, the Prometheus text
//! exposition, the same metrics as JSON, and the evaluated health report.
//! Health maps to HTTP status: 200 while the gateway is fit to serve
//! (healthy or degraded), 503 when it is not.

#![forbid(unsafe_code)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use bloxgate_observe::HealthEvaluator;
use bloxgate_observe::MetricsCollector;
use bloxgate_resilience::CircuitBreakers;
use serde_json::json;

/// Content type of the Prometheus text exposition.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// ============================================================================
// SECTION: State and Router
// ============================================================================

/// Shared state behind the admin routes.
pub struct AdminState {
    /// Metric registers read by every route.
    pub metrics: Arc<MetricsCollector>,
    /// Breaker registry feeding health and the state gauge.
    pub breakers: Arc<CircuitBreakers>,
    /// Health policy evaluator.
    pub evaluator: HealthEvaluator,
}

/// Builds the admin router.
pub fn router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(metrics_text))
        .route("/metrics/json", get(metrics_json))
        .route("/health", get(health))
        .with_state(state)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// GET `/`: endpoint index and uptime.
async fn index(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    axum::Json(json!({
        "service": "bloxgate",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.metrics.uptime().as_secs_f64(),
        "endpoints": {
            "/metrics": "Prometheus text exposition",
            "/metrics/json": "Metrics as JSON",
            "/health": "Health report",
        },
    }))
}

/// GET `/metrics`: Prometheus text exposition.
async fn metrics_text(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    publish_breaker_gauges(&state);
    (
        [(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render_prometheus(),
    )
}

/// GET `/metrics/json`: the same registers as JSON.
async fn metrics_json(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    publish_breaker_gauges(&state);
    axum::Json(state.metrics.snapshot())
}

/// GET `/health`: evaluated health with status mapping.
async fn health(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let report = state.evaluator.evaluate(&state.metrics, state.breakers.health_views());
    let status = StatusCode::from_u16(report.status.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(report))
}

/// Refreshes the breaker state gauges before a read.
///
/// Transitions update the gauge as they happen; this keeps scrape output
/// correct even for services that have seen no traffic yet.
fn publish_breaker_gauges(state: &AdminState) {
    for view in state.breakers.snapshot() {
        state.metrics.set_gauge(
            bloxgate_observe::names::CIRCUIT_BREAKER_STATE,
            &[("service", view.service.as_str())],
            view.state.gauge_value(),
        );
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use std::time::Duration;

    use axum::body::to_bytes;
    use bloxgate_resilience::BreakerConfig;
    use bloxgate_upstream::ServiceKind;

    use super::*;

    fn admin_state() -> Arc<AdminState> {
        Arc::new(AdminState {
            metrics: Arc::new(MetricsCollector::new()),
            breakers: Arc::new(CircuitBreakers::new(BreakerConfig {
                failure_threshold: 5,
                reset_timeout: Duration::from_secs(60),
            })),
            evaluator: HealthEvaluator::new(0.0),
        })
    }

    #[tokio::test]
    async fn index_lists_the_surface() {
        let response = index(State(admin_state())).await.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["service"], json!("bloxgate"));
        assert!(value["endpoints"]["/health"].is_string());
    }

    #[tokio::test]
    async fn metrics_text_exposes_breaker_gauges_with_help() {
        let state = admin_state();
        let response = metrics_text(State(state)).await.into_response();
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            PROMETHEUS_CONTENT_TYPE
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("# TYPE circuit_breaker_state gauge"));
        assert!(text.contains("circuit_breaker_state{service=\"infoblox_api\"} 0"));
        assert!(text.contains("uptime_seconds"));
    }

    #[tokio::test]
    async fn health_is_ok_until_a_breaker_opens_long() {
        let state = admin_state();
        let response = health(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        // Open the infoblox breaker and keep it open past the threshold.
        for _ in 0..5 {
            state.breakers.record_failure(ServiceKind::InfobloxApi);
        }
        tokio::time::pause();
        tokio::time::advance(Duration::from_secs(120)).await;
        let response = health(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["status"], json!("unhealthy"));
        assert!(!value["issues"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn metrics_json_mirrors_the_snapshot() {
        let state = admin_state();
        state.metrics.inc_counter(
            bloxgate_observe::names::RPC_REQUESTS_TOTAL,
            &[("tool", "list_subnets"), ("status", "ok")],
        );
        let response = metrics_json(State(state)).await.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value["counters"]["rpc_requests_total{status=\"ok\",tool=\"list_subnets\"}"],
            json!(1)
        );
    }
}
