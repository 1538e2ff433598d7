// crates/bloxgate-resilience/tests/pipeline.rs
// ============================================================================
// Module: Pipeline Behavior Tests
// Description: Breaker, cache, retry, and timeout behavior end to end.
// Purpose: Pin the stage ordering guarantees against a scripted upstream.
// Dependencies: async-trait, tokio
// ============================================================================

#![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use bloxgate_observe::MetricsCollector;
use bloxgate_observe::NoopSpanSink;
use bloxgate_observe::names;
use bloxgate_resilience::BreakerConfig;
use bloxgate_resilience::BreakerState;
use bloxgate_resilience::CacheSettings;
use bloxgate_resilience::CallError;
use bloxgate_resilience::CallPipeline;
use bloxgate_resilience::CircuitBreakers;
use bloxgate_resilience::PipelineRequest;
use bloxgate_resilience::RetryPolicy;
use bloxgate_resilience::ToolCache;
use bloxgate_resilience::argument_fingerprint;
use bloxgate_upstream::ServiceKind;
use bloxgate_upstream::UpstreamError;
use bloxgate_upstream::UpstreamRequest;
use bloxgate_upstream::UpstreamResponse;
use bloxgate_upstream::UpstreamTransport;
use serde_json::Value;
use serde_json::json;

// ----------------------------------------------------------------------------
// Scripted upstream double
// ----------------------------------------------------------------------------

/// One scripted upstream step.
enum Step {
    Ok(Value),
    Err(fn() -> UpstreamError),
    /// Never completes; used for deadline tests.
    Hang,
}

/// Transport that replays a script and counts calls.
struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamTransport for ScriptedTransport {
    async fn send(&self, _request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Ok(body)) => Ok(UpstreamResponse {
                status: 200,
                retry_after: None,
                body,
            }),
            Some(Step::Err(make)) => Err(make()),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Err(UpstreamError::Timeout)
            }
            // Script exhausted: keep succeeding.
            None => Ok(UpstreamResponse {
                status: 200,
                retry_after: None,
                body: json!({"results": []}),
            }),
        }
    }
}

fn server_error() -> UpstreamError {
    UpstreamError::ServerError {
        status: 500,
        body: json!({"error": "boom"}),
    }
}

fn rate_limited() -> UpstreamError {
    UpstreamError::RateLimited {
        retry_after: Some(Duration::from_secs(2)),
    }
}

fn not_found() -> UpstreamError {
    UpstreamError::ClientError {
        status: 404,
        body: json!({"error": "missing"}),
        retry_after: None,
    }
}

// ----------------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------------

struct Harness {
    pipeline: CallPipeline,
    transport: Arc<ScriptedTransport>,
    metrics: Arc<MetricsCollector>,
}

fn harness(steps: Vec<Step>) -> Harness {
    harness_with(steps, true)
}

fn harness_with(steps: Vec<Step>, cache_enabled: bool) -> Harness {
    let transport = ScriptedTransport::new(steps);
    let metrics = Arc::new(MetricsCollector::new());
    let breakers = Arc::new(CircuitBreakers::new(BreakerConfig {
        failure_threshold: 5,
        reset_timeout: Duration::from_secs(60),
    }));
    let cache = Arc::new(ToolCache::new(CacheSettings {
        enabled: cache_enabled,
        default_ttl: Duration::from_secs(300),
        max_entries_per_tool: 1_000,
    }));
    let pipeline = CallPipeline::new(
        transport.clone(),
        breakers,
        cache,
        RetryPolicy::new(12),
        Duration::from_secs(30),
        metrics.clone(),
        Arc::new(NoopSpanSink),
    );
    Harness {
        pipeline,
        transport,
        metrics,
    }
}

fn read_call(tool: &str, arguments: Value) -> PipelineRequest {
    let map = arguments.as_object().unwrap().clone();
    PipelineRequest {
        tool: tool.to_string(),
        request: UpstreamRequest::get(ServiceKind::InfobloxApi, "/ipam/ip_space")
            .with_query("_limit", "10"),
        cache_ttl: Some(Duration::from_secs(300)),
        fingerprint: Some(argument_fingerprint(&map).unwrap()),
        correlation_id: "test-corr".to_string(),
        span_parent: None,
    }
}

fn mutate_call(tool: &str) -> PipelineRequest {
    PipelineRequest {
        tool: tool.to_string(),
        request: UpstreamRequest::post(
            ServiceKind::InfobloxApi,
            "/ipam/subnet",
            json!({"address": "10.0.0.0/24"}),
        ),
        cache_ttl: None,
        fingerprint: None,
        correlation_id: "test-corr".to_string(),
        span_parent: None,
    }
}

// ----------------------------------------------------------------------------
// Cache behavior
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn repeated_read_hits_cache_with_one_upstream_call() {
    let h = harness(vec![Step::Ok(json!({"results": [{"id": "space-1"}]}))]);
    let first = h.pipeline.execute(read_call("list_ip_spaces", json!({"limit": 10}))).await.unwrap();
    let second =
        h.pipeline.execute(read_call("list_ip_spaces", json!({"limit": 10}))).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.transport.calls(), 1);
    assert_eq!(h.metrics.counter_total(names::CACHE_HITS_TOTAL), 1);
    assert_eq!(h.metrics.counter_total(names::CACHE_MISSES_TOTAL), 1);
}

#[tokio::test(start_paused = true)]
async fn different_arguments_miss_independently() {
    let h = harness(vec![
        Step::Ok(json!({"results": ["a"]})),
        Step::Ok(json!({"results": ["b"]})),
    ]);
    h.pipeline.execute(read_call("list_ip_spaces", json!({"limit": 10}))).await.unwrap();
    h.pipeline.execute(read_call("list_ip_spaces", json!({"limit": 20}))).await.unwrap();
    assert_eq!(h.transport.calls(), 2);
    assert_eq!(h.metrics.counter_total(names::CACHE_MISSES_TOTAL), 2);
}

#[tokio::test(start_paused = true)]
async fn entry_expires_at_ttl_boundary() {
    let h = harness(vec![
        Step::Ok(json!({"generation": 1})),
        Step::Ok(json!({"generation": 2})),
    ]);
    let call = || read_call("list_ip_spaces", json!({"limit": 10}));
    h.pipeline.execute(call()).await.unwrap();

    tokio::time::advance(Duration::from_secs(299)).await;
    let hit = h.pipeline.execute(call()).await.unwrap();
    assert_eq!(hit, json!({"generation": 1}));
    assert_eq!(h.transport.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    let refreshed = h.pipeline.execute(call()).await.unwrap();
    assert_eq!(refreshed, json!({"generation": 2}));
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn mutations_never_touch_the_cache() {
    let h = harness(vec![
        Step::Ok(json!({"id": "subnet-1"})),
        Step::Ok(json!({"id": "subnet-2"})),
    ]);
    h.pipeline.execute(mutate_call("create_subnet")).await.unwrap();
    h.pipeline.execute(mutate_call("create_subnet")).await.unwrap();
    assert_eq!(h.transport.calls(), 2);
    assert_eq!(h.metrics.counter_total(names::CACHE_HITS_TOTAL), 0);
    assert_eq!(h.metrics.counter_total(names::CACHE_MISSES_TOTAL), 0);
}

#[tokio::test(start_paused = true)]
async fn disabled_cache_degrades_to_upstream_calls() {
    let h = harness_with(
        vec![Step::Ok(json!({"n": 1})), Step::Ok(json!({"n": 2}))],
        false,
    );
    h.pipeline.execute(read_call("list_ip_spaces", json!({"limit": 10}))).await.unwrap();
    h.pipeline.execute(read_call("list_ip_spaces", json!({"limit": 10}))).await.unwrap();
    assert_eq!(h.transport.calls(), 2);
    // Disabled caching means the calls are not cache-eligible at all.
    assert_eq!(h.metrics.counter_total(names::CACHE_MISSES_TOTAL), 0);
}

// ----------------------------------------------------------------------------
// Breaker behavior
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn breaker_opens_after_five_consecutive_500s() {
    let h = harness(vec![
        Step::Err(server_error),
        Step::Err(server_error),
        Step::Err(server_error),
        Step::Err(server_error),
        Step::Err(server_error),
    ]);
    for _ in 0..5 {
        let err = h.pipeline.execute(mutate_call("create_subnet")).await.unwrap_err();
        assert!(matches!(
            err,
            CallError::UpstreamServer {
                status: 500
            }
        ));
    }
    assert_eq!(h.transport.calls(), 5);

    // Sixth call fails fast without reaching the upstream.
    let err = h.pipeline.execute(mutate_call("create_subnet")).await.unwrap_err();
    assert!(matches!(
        err,
        CallError::CircuitOpen {
            service: ServiceKind::InfobloxApi,
            ..
        }
    ));
    assert_eq!(h.transport.calls(), 5);
    assert_eq!(h.metrics.counter_total(names::CIRCUIT_BREAKER_OPEN_TOTAL), 1);
    assert_eq!(
        h.metrics
            .gauge_value(names::CIRCUIT_BREAKER_STATE, &[("service", "infoblox_api")]),
        Some(1.0)
    );
}

#[tokio::test(start_paused = true)]
async fn breaker_recovers_through_a_probe() {
    let h = harness(vec![
        Step::Err(server_error),
        Step::Err(server_error),
        Step::Err(server_error),
        Step::Err(server_error),
        Step::Err(server_error),
        Step::Ok(json!({"results": []})),
    ]);
    for _ in 0..5 {
        let _ = h.pipeline.execute(mutate_call("create_subnet")).await;
    }
    assert_eq!(h.pipeline.breakers().state(ServiceKind::InfobloxApi), BreakerState::Open);

    tokio::time::advance(Duration::from_secs(61)).await;
    let result = h.pipeline.execute(mutate_call("create_subnet")).await;
    assert!(result.is_ok());
    assert_eq!(h.pipeline.breakers().state(ServiceKind::InfobloxApi), BreakerState::Closed);
    assert_eq!(
        h.metrics
            .gauge_value(names::CIRCUIT_BREAKER_STATE, &[("service", "infoblox_api")]),
        Some(0.0)
    );

    // Traffic flows normally again.
    let result = h.pipeline.execute(mutate_call("create_subnet")).await;
    assert!(result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn excluded_errors_do_not_move_the_breaker() {
    let h = harness(vec![
        Step::Err(not_found),
        Step::Err(not_found),
        Step::Err(not_found),
        Step::Err(not_found),
        Step::Err(not_found),
        Step::Err(not_found),
    ]);
    for _ in 0..6 {
        let err = h.pipeline.execute(mutate_call("delete_subnet")).await.unwrap_err();
        assert!(matches!(
            err,
            CallError::UpstreamClient {
                status: 404,
                ..
            }
        ));
    }
    assert_eq!(h.transport.calls(), 6);
    assert_eq!(h.pipeline.breakers().state(ServiceKind::InfobloxApi), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_surfaces_timeout_without_breaker_movement() {
    let h = harness(vec![Step::Hang]);
    let err = h.pipeline.execute(mutate_call("create_subnet")).await.unwrap_err();
    assert!(matches!(err, CallError::Timeout));
    assert_eq!(h.pipeline.breakers().state(ServiceKind::InfobloxApi), BreakerState::Closed);
}

// ----------------------------------------------------------------------------
// Retry behavior
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rate_limit_honors_retry_after_then_succeeds() {
    let h = harness(vec![
        Step::Err(rate_limited),
        Step::Err(rate_limited),
        Step::Err(rate_limited),
        Step::Err(rate_limited),
        Step::Ok(json!({"results": ["subnet"]})),
    ]);
    let started = tokio::time::Instant::now();
    let result = h.pipeline.execute(read_call("list_subnets", json!({"limit": 50}))).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result, json!({"results": ["subnet"]}));
    assert_eq!(h.transport.calls(), 5);
    // Four honored Retry-After sleeps of 2 s each.
    assert!(elapsed >= Duration::from_secs(8), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(9), "elapsed {elapsed:?}");
    assert_eq!(h.metrics.counter_total(names::API_RETRIES_TOTAL), 4);
    assert_eq!(h.pipeline.breakers().state(ServiceKind::InfobloxApi), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhausts_into_rate_limited() {
    let steps: Vec<Step> = (0..12).map(|_| Step::Err(rate_limited)).collect();
    let h = harness(steps);
    let err = h.pipeline.execute(read_call("list_subnets", json!({"limit": 50}))).await.unwrap_err();
    assert!(matches!(
        err,
        CallError::RateLimited {
            ..
        }
    ));
    assert_eq!(h.transport.calls(), 12);
    assert_eq!(h.metrics.counter_total(names::API_RETRIES_TOTAL), 11);
}

#[tokio::test(start_paused = true)]
async fn conflict_on_compound_endpoint_is_retried() {
    let conflict = || UpstreamError::ClientError {
        status: 409,
        body: json!({"error": "operation in progress"}),
        retry_after: None,
    };
    let h = harness(vec![Step::Err(conflict), Step::Ok(json!({"status": "success"}))]);
    let call = PipelineRequest {
        tool: "configure_vpn_infrastructure".to_string(),
        request: bloxgate_upstream::UpstreamClient::consolidated_configure(
            json!({"universal_service": {"operation": "CREATE"}}),
        ),
        cache_ttl: None,
        fingerprint: None,
        correlation_id: "test-corr".to_string(),
        span_parent: None,
    };
    let result = h.pipeline.execute(call).await.unwrap();
    assert_eq!(result, json!({"status": "success"}));
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn server_errors_are_not_retried_in_call() {
    let h = harness(vec![Step::Err(server_error)]);
    let err = h.pipeline.execute(read_call("list_auth_zones", json!({"limit": 100}))).await;
    assert!(matches!(
        err,
        Err(CallError::UpstreamServer {
            status: 500
        })
    ));
    assert_eq!(h.transport.calls(), 1);
    assert_eq!(h.metrics.counter_total(names::API_RETRIES_TOTAL), 0);
}

// ----------------------------------------------------------------------------
// Cancellation
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn aborted_call_leaves_cache_and_breaker_untouched() {
    let h = harness(vec![Step::Hang]);
    let call = read_call("list_ip_spaces", json!({"limit": 10}));
    let pipeline = h.pipeline;
    let breakers = Arc::clone(pipeline.breakers());
    let cache = Arc::clone(pipeline.cache());

    let task = tokio::spawn(async move { pipeline.execute(call).await });
    // Let the call reach its upstream await, then cancel it.
    tokio::time::sleep(Duration::from_secs(1)).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert_eq!(cache.entry_count(), 0);
    assert_eq!(breakers.state(ServiceKind::InfobloxApi), BreakerState::Closed);
}
