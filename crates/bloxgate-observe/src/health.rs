// crates/bloxgate-observe/src/health.rs
// ============================================================================
// Module: Health Evaluator
// Description: Derived gateway health from metric registers and breakers.
// Purpose: Drive the /health endpoint and its HTTP status mapping.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Health is computed, never stored: the evaluator folds the metric
//! snapshot and the current breaker states into `healthy`, `degraded`, or
//! `unhealthy`, with one issue string per contributing cause.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::metrics::MetricsCollector;
use crate::metrics::names;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Trailing window for error-rate evaluation.
const ERROR_RATE_WINDOW: Duration = Duration::from_secs(300);
/// Error rate at which health degrades.
const DEGRADED_ERROR_RATE: f64 = 0.05;
/// Error rate at which health fails.
const UNHEALTHY_ERROR_RATE: f64 = 0.25;
/// Seconds a breaker may stay open before health fails.
const UNHEALTHY_OPEN_SECS: f64 = 60.0;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Breaker state label as seen by the health evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStateLabel {
    /// Requests flow normally.
    Closed,
    /// One probe request is admitted.
    HalfOpen,
    /// Requests are rejected.
    Open,
}

/// One breaker's state as reported by the resilience layer.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerHealthView {
    /// Upstream service label.
    pub service: &'static str,
    /// Current breaker state.
    pub state: BreakerStateLabel,
    /// Seconds since the last state transition.
    pub seconds_in_state: f64,
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Overall gateway status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Everything within thresholds.
    Healthy,
    /// Serving, but something needs attention.
    Degraded,
    /// Not fit to serve.
    Unhealthy,
}

impl HealthStatus {
    /// Returns the HTTP status the admin surface maps this status to.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Healthy | Self::Degraded => 200,
            Self::Unhealthy => 503,
        }
    }
}

/// Headline numbers included in the health payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthMetrics {
    /// Total RPC requests observed.
    pub total_requests: u64,
    /// Error rate over the trailing window, when there was traffic.
    pub error_rate_5m: Option<f64>,
    /// Aggregate cache hit rate.
    pub cache_hit_rate: f64,
    /// Live session count.
    pub active_sessions: f64,
    /// Breaker states by service.
    pub breakers: Vec<BreakerHealthView>,
}

/// Evaluated health report served by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Derived status.
    pub status: HealthStatus,
    /// Seconds since process start.
    pub uptime_seconds: f64,
    /// Human-readable contributing causes, empty when healthy.
    pub issues: Vec<String>,
    /// Headline metric values.
    pub metrics: HealthMetrics,
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Derives gateway health from metrics and breaker states.
#[derive(Debug, Clone)]
pub struct HealthEvaluator {
    /// Cache hit rate below which health degrades.
    cache_hit_rate_floor: f64,
}

impl HealthEvaluator {
    /// Creates an evaluator with the configured hit-rate floor.
    #[must_use]
    pub const fn new(cache_hit_rate_floor: f64) -> Self {
        Self {
            cache_hit_rate_floor,
        }
    }

    /// Evaluates current health.
    #[must_use]
    pub fn evaluate(
        &self,
        collector: &MetricsCollector,
        breakers: Vec<BreakerHealthView>,
    ) -> HealthReport {
        let mut issues = Vec::new();
        let mut status = HealthStatus::Healthy;

        let error_rate = collector.error_rate(ERROR_RATE_WINDOW);
        if let Some(rate) = error_rate {
            if rate >= UNHEALTHY_ERROR_RATE {
                status = HealthStatus::Unhealthy;
                issues.push(format!("error rate {:.1}% over the last 5m", rate * 100.0));
            } else if rate >= DEGRADED_ERROR_RATE {
                status = worst(status, HealthStatus::Degraded);
                issues.push(format!("elevated error rate {:.1}% over the last 5m", rate * 100.0));
            }
        }

        for breaker in &breakers {
            match breaker.state {
                BreakerStateLabel::Open => {
                    if breaker.seconds_in_state > UNHEALTHY_OPEN_SECS {
                        status = HealthStatus::Unhealthy;
                        issues.push(format!(
                            "circuit breaker for {} open for {:.0}s",
                            breaker.service, breaker.seconds_in_state
                        ));
                    } else {
                        status = worst(status, HealthStatus::Degraded);
                        issues.push(format!("circuit breaker for {} is open", breaker.service));
                    }
                }
                BreakerStateLabel::HalfOpen => {
                    status = worst(status, HealthStatus::Degraded);
                    issues.push(format!("circuit breaker for {} is probing", breaker.service));
                }
                BreakerStateLabel::Closed => {}
            }
        }

        let hits = collector.counter_total(names::CACHE_HITS_TOTAL);
        let misses = collector.counter_total(names::CACHE_MISSES_TOTAL);
        let eligible = hits + misses;
        let cache_hit_rate = if eligible == 0 { 0.0 } else { hits as f64 / eligible as f64 };
        if eligible > 0 && cache_hit_rate < self.cache_hit_rate_floor {
            status = worst(status, HealthStatus::Degraded);
            issues.push(format!(
                "cache hit rate {:.1}% below floor {:.1}%",
                cache_hit_rate * 100.0,
                self.cache_hit_rate_floor * 100.0
            ));
        }

        HealthReport {
            status,
            uptime_seconds: collector.uptime().as_secs_f64(),
            issues,
            metrics: HealthMetrics {
                total_requests: collector.counter_total(names::RPC_REQUESTS_TOTAL),
                error_rate_5m: error_rate,
                cache_hit_rate,
                active_sessions: collector
                    .gauge_value(names::ACTIVE_SESSIONS, &[])
                    .unwrap_or(0.0),
                breakers,
            },
        }
    }
}

/// Returns the worse of two statuses, never downgrading.
const fn worst(current: HealthStatus, candidate: HealthStatus) -> HealthStatus {
    match (current, candidate) {
        (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
        (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;
    use crate::metrics::MetricsCollector;

    fn closed(service: &'static str) -> BreakerHealthView {
        BreakerHealthView {
            service,
            state: BreakerStateLabel::Closed,
            seconds_in_state: 10.0,
        }
    }

    #[test]
    fn quiet_gateway_is_healthy() {
        let collector = MetricsCollector::new();
        let report = HealthEvaluator::new(0.0).evaluate(&collector, vec![closed("infoblox_api")]);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.issues.is_empty());
        assert_eq!(report.status.http_status(), 200);
    }

    #[test]
    fn half_open_breaker_degrades() {
        let collector = MetricsCollector::new();
        let report = HealthEvaluator::new(0.0).evaluate(
            &collector,
            vec![BreakerHealthView {
                service: "infoblox_api",
                state: BreakerStateLabel::HalfOpen,
                seconds_in_state: 1.0,
            }],
        );
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.status.http_status(), 200);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn long_open_breaker_is_unhealthy() {
        let collector = MetricsCollector::new();
        let report = HealthEvaluator::new(0.0).evaluate(
            &collector,
            vec![BreakerHealthView {
                service: "niosxaas_api",
                state: BreakerStateLabel::Open,
                seconds_in_state: 120.0,
            }],
        );
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.status.http_status(), 503);
    }

    #[test]
    fn error_rate_thresholds() {
        let collector = MetricsCollector::new();
        for _ in 0..9 {
            collector.record_outcome(true);
        }
        collector.record_outcome(false);
        let report = HealthEvaluator::new(0.0).evaluate(&collector, Vec::new());
        assert_eq!(report.status, HealthStatus::Degraded);

        let collector = MetricsCollector::new();
        for _ in 0..3 {
            collector.record_outcome(false);
        }
        collector.record_outcome(true);
        let report = HealthEvaluator::new(0.0).evaluate(&collector, Vec::new());
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn hit_rate_floor_degrades_only_with_traffic() {
        let collector = MetricsCollector::new();
        let evaluator = HealthEvaluator::new(0.5);
        let report = evaluator.evaluate(&collector, Vec::new());
        assert_eq!(report.status, HealthStatus::Healthy);

        collector.inc_counter(names::CACHE_MISSES_TOTAL, &[("tool", "list_subnets")]);
        let report = evaluator.evaluate(&collector, Vec::new());
        assert_eq!(report.status, HealthStatus::Degraded);
    }
}
