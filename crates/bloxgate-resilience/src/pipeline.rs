// crates/bloxgate-resilience/src/pipeline.rs
// ============================================================================
// Module: Call Pipeline
// Description: Ordered policy stages around every upstream invocation.
// Purpose: Compose timeout, breaker, cache, retry, and telemetry per call.
// Dependencies: bloxgate-upstream, bloxgate-observe, tokio
// ============================================================================

//! ## Overview
//! Stages run in a fixed order per call: breaker gate, cache lookup,
//! upstream attempt under a deadline, retry for retryable failures, breaker
//! update, cache insert, telemetry emission. Cancellation arrives as task
//! abort from the session layer: the future is dropped at an await point,
//! so a cancelled call can neither insert into the cache nor move a breaker
//! counter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use bloxgate_observe::MetricsCollector;
use bloxgate_observe::Span;
use bloxgate_observe::SpanContext;
use bloxgate_observe::SpanSink;
use bloxgate_observe::SpanStatus;
use bloxgate_observe::names;
use bloxgate_upstream::UpstreamError;
use bloxgate_upstream::UpstreamRequest;
use bloxgate_upstream::UpstreamTransport;
use serde_json::Value;

use crate::breaker::Admission;
use crate::breaker::CircuitBreakers;
use crate::breaker::Transition;
use crate::cache::ToolCache;
use crate::error::CallError;
use crate::retry::RetryPolicy;

// ============================================================================
// SECTION: Request Shape
// ============================================================================

/// One tool call as seen by the pipeline.
///
/// # Invariants
/// - `fingerprint` is present iff the call is a cache-eligible read.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Tool name, used for cache and metric keys.
    pub tool: String,
    /// The upstream call to perform.
    pub request: UpstreamRequest,
    /// Resolved cache TTL; `None` for mutations and uncached reads.
    pub cache_ttl: Option<Duration>,
    /// Canonical argument fingerprint for cache keying.
    pub fingerprint: Option<String>,
    /// Correlation id threaded through logs and spans.
    pub correlation_id: String,
    /// Parent span for the upstream child span.
    pub span_parent: Option<SpanContext>,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// The resilience pipeline every tool call is routed through.
pub struct CallPipeline {
    /// Upstream transport (production client or test fake).
    transport: Arc<dyn UpstreamTransport>,
    /// Per-service circuit breakers.
    breakers: Arc<CircuitBreakers>,
    /// Per-tool response cache.
    cache: Arc<ToolCache>,
    /// Retry schedule for retryable failures.
    retry: RetryPolicy,
    /// Deadline applied to each upstream attempt.
    request_timeout: Duration,
    /// Metric registers.
    metrics: Arc<MetricsCollector>,
    /// Span destination.
    spans: Arc<dyn SpanSink>,
}

impl CallPipeline {
    /// Wires the pipeline from its injected collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn UpstreamTransport>,
        breakers: Arc<CircuitBreakers>,
        cache: Arc<ToolCache>,
        retry: RetryPolicy,
        request_timeout: Duration,
        metrics: Arc<MetricsCollector>,
        spans: Arc<dyn SpanSink>,
    ) -> Self {
        Self {
            transport,
            breakers,
            cache,
            retry,
            request_timeout,
            metrics,
            spans,
        }
    }

    /// Returns the breaker registry for health reporting.
    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakers> {
        &self.breakers
    }

    /// Returns the cache for entry-count gauges.
    #[must_use]
    pub fn cache(&self) -> &Arc<ToolCache> {
        &self.cache
    }

    /// Executes one call through the full stage order.
    ///
    /// # Errors
    ///
    /// Returns [`CallError`] when the breaker rejects the call or the
    /// upstream fails after the retry budget.
    pub async fn execute(&self, call: PipelineRequest) -> Result<Value, CallError> {
        let service = call.request.service;
        let path = call.request.full_path();
        let mut span = self.open_span(&call);
        span.set_attribute("service", service.as_str());
        span.set_attribute("method", call.request.method.as_str());
        span.set_attribute("path", path.as_str());

        let (admission, transition) = self.breakers.admit(service);
        if let Some(transition) = transition {
            self.note_transition(&transition, &call.correlation_id);
        }
        span.set_attribute("breaker_state", self.breakers.state(service).as_str());
        if let Admission::Rejected {
            retry_in,
        } = admission
        {
            span.set_attribute("error_kind", "circuit_open");
            span.finish(SpanStatus::Error);
            return Err(CallError::CircuitOpen {
                service,
                retry_in,
            });
        }

        let eligible =
            self.cache.enabled() && call.cache_ttl.is_some() && call.fingerprint.is_some();
        if eligible {
            // A probe must reach the upstream so the breaker gets evidence;
            // only a normally admitted call may be served from cache.
            if admission == Admission::Allow {
                if let Some(fingerprint) = &call.fingerprint {
                    if let Some(value) = self.cache.lookup(&call.tool, fingerprint) {
                        self.metrics
                            .inc_counter(names::CACHE_HITS_TOTAL, &[("tool", call.tool.as_str())]);
                        self.update_cache_gauges();
                        tracing::debug!(
                            event = "cache_hit",
                            tool = %call.tool,
                            correlation_id = %call.correlation_id,
                        );
                        span.set_attribute("cache_outcome", "hit");
                        span.finish(SpanStatus::Ok);
                        return Ok(value);
                    }
                }
            }
            self.metrics.inc_counter(names::CACHE_MISSES_TOTAL, &[("tool", call.tool.as_str())]);
            self.update_cache_gauges();
            tracing::debug!(
                event = "cache_miss",
                tool = %call.tool,
                correlation_id = %call.correlation_id,
            );
            span.set_attribute("cache_outcome", "miss");
        } else {
            span.set_attribute("cache_outcome", "bypass");
        }

        self.run_attempts(call, span, &path, eligible).await
    }

    /// Runs the attempt loop: upstream call, retry, breaker update, insert.
    async fn run_attempts(
        &self,
        call: PipelineRequest,
        mut span: Span,
        path: &str,
        cache_eligible: bool,
    ) -> Result<Value, CallError> {
        let service = call.request.service;
        let mut attempt: u32 = 1;
        loop {
            let attempt_started = tokio::time::Instant::now();
            let outcome = tokio::time::timeout(
                self.request_timeout,
                self.transport.send(&call.request),
            )
            .await;
            let result = match outcome {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Timeout),
            };
            self.metrics.observe_duration_ms(
                names::UPSTREAM_REQUEST_DURATION_MS,
                &[("service", service.as_str()), ("path", path)],
                attempt_started.elapsed().as_secs_f64() * 1_000.0,
            );

            match result {
                Ok(response) => {
                    if let Some(transition) = self.breakers.record_success(service) {
                        self.note_transition(&transition, &call.correlation_id);
                    }
                    if cache_eligible {
                        if let (Some(ttl), Some(fingerprint)) =
                            (call.cache_ttl, call.fingerprint.as_ref())
                        {
                            self.cache.insert(
                                &call.tool,
                                fingerprint,
                                response.body.clone(),
                                ttl,
                            );
                            self.update_cache_gauges();
                        }
                    }
                    span.set_attribute("status", i64::from(response.status));
                    span.set_attribute("attempts", i64::from(attempt));
                    span.finish(SpanStatus::Ok);
                    return Ok(response.body);
                }
                Err(error) => {
                    if RetryPolicy::is_retryable(&error) && attempt < self.retry.max_attempts {
                        let sleep = self.retry.backoff(attempt, error.retry_after());
                        let status_label = error
                            .status()
                            .map_or_else(|| error.kind_label().to_string(), |s| s.to_string());
                        tracing::warn!(
                            event = "api_retry",
                            endpoint = %path,
                            attempt,
                            max = self.retry.max_attempts,
                            sleep_secs = sleep.as_secs_f64(),
                            status = %status_label,
                            correlation_id = %call.correlation_id,
                        );
                        self.metrics.inc_counter(
                            names::API_RETRIES_TOTAL,
                            &[("endpoint", path), ("status", status_label.as_str())],
                        );
                        tokio::time::sleep(sleep).await;
                        attempt += 1;
                        continue;
                    }

                    if counts_toward_breaker(&error) {
                        if let Some(transition) = self.breakers.record_failure(service) {
                            self.note_transition(&transition, &call.correlation_id);
                        }
                    }
                    if let Some(status) = error.status() {
                        span.set_attribute("status", i64::from(status));
                    }
                    span.set_attribute("error_kind", error.kind_label());
                    span.set_attribute("attempts", i64::from(attempt));
                    span.finish(SpanStatus::Error);
                    return Err(CallError::from_upstream(error));
                }
            }
        }
    }

    /// Opens the upstream child span for one call.
    fn open_span(&self, call: &PipelineRequest) -> Span {
        match &call.span_parent {
            Some(parent) => {
                Span::with_parent(Arc::clone(&self.spans), parent, "upstream_request")
            }
            None => Span::root(Arc::clone(&self.spans), "upstream_request"),
        }
    }

    /// Logs and gauges one breaker transition.
    fn note_transition(&self, transition: &Transition, correlation_id: &str) {
        tracing::warn!(
            event = "circuit_breaker_state_change",
            service = %transition.service,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            correlation_id = %correlation_id,
        );
        if transition.to == crate::breaker::BreakerState::Open {
            self.metrics.inc_counter(
                names::CIRCUIT_BREAKER_OPEN_TOTAL,
                &[("service", transition.service.as_str())],
            );
        }
        self.metrics.set_gauge(
            names::CIRCUIT_BREAKER_STATE,
            &[("service", transition.service.as_str())],
            transition.to.gauge_value(),
        );
    }

    /// Refreshes the aggregate cache gauges.
    fn update_cache_gauges(&self) {
        let hits = self.metrics.counter_total(names::CACHE_HITS_TOTAL) as f64;
        let misses = self.metrics.counter_total(names::CACHE_MISSES_TOTAL) as f64;
        let eligible = hits + misses;
        let rate = if eligible == 0.0 { 0.0 } else { hits / eligible };
        self.metrics.set_gauge(names::CACHE_HIT_RATE, &[], rate);
        self.metrics.set_gauge(names::CACHE_ENTRIES, &[], self.cache.entry_count() as f64);
    }
}

/// Returns whether a final failure feeds the breaker counter.
///
/// Client errors, rate limiting, and deadline expiry are excluded: they say
/// nothing about upstream health worth tripping the breaker over.
const fn counts_toward_breaker(error: &UpstreamError) -> bool {
    matches!(
        error,
        UpstreamError::ServerError {
            ..
        } | UpstreamError::Transport {
            ..
        }
    )
}
