// crates/bloxgate-observe/src/metrics.rs
// ============================================================================
// Module: Metrics Collector
// Description: Labeled counters, gauges, and latency histograms.
// Purpose: Back the admin surface and health evaluation with one register.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Registers are created lazily on first observation and keyed by
//! `(name, label set)`. Histograms keep the most recent samples and compute
//! percentiles at read time. Everything sits behind short-lived mutexes;
//! callers never hold a guard across a suspension point.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;

// ============================================================================
// SECTION: Metric Names
// ============================================================================

/// Canonical metric names emitted by the gateway.
pub mod names {
    /// RPC requests by tool and outcome.
    pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
    /// RPC errors by tool and error kind.
    pub const RPC_ERRORS_TOTAL: &str = "rpc_errors_total";
    /// Cache hits by tool.
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    /// Cache misses by tool.
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    /// Breaker open transitions by service.
    pub const CIRCUIT_BREAKER_OPEN_TOTAL: &str = "circuit_breaker_open_total";
    /// Upstream retries by endpoint.
    pub const API_RETRIES_TOTAL: &str = "api_retries_total";
    /// Aggregate cache hit rate.
    pub const CACHE_HIT_RATE: &str = "cache_hit_rate";
    /// Live cache entry count.
    pub const CACHE_ENTRIES: &str = "cache_entries";
    /// Breaker state by service (0 closed, 0.5 half-open, 1 open).
    pub const CIRCUIT_BREAKER_STATE: &str = "circuit_breaker_state";
    /// Process uptime in seconds.
    pub const UPTIME_SECONDS: &str = "uptime_seconds";
    /// Live session count.
    pub const ACTIVE_SESSIONS: &str = "active_sessions";
    /// RPC latency by tool.
    pub const RPC_REQUEST_DURATION_MS: &str = "rpc_request_duration_ms";
    /// Upstream latency by service and path.
    pub const UPSTREAM_REQUEST_DURATION_MS: &str = "upstream_request_duration_ms";
}

/// Help text for the Prometheus exposition.
fn help_for(name: &str) -> &'static str {
    match name {
        names::RPC_REQUESTS_TOTAL => "Total RPC tool calls by tool and status",
        names::RPC_ERRORS_TOTAL => "Total RPC tool failures by tool and error kind",
        names::CACHE_HITS_TOTAL => "Total response cache hits by tool",
        names::CACHE_MISSES_TOTAL => "Total response cache misses by tool",
        names::CIRCUIT_BREAKER_OPEN_TOTAL => "Total circuit breaker open transitions by service",
        names::API_RETRIES_TOTAL => "Total upstream retries by endpoint and status",
        names::CACHE_HIT_RATE => "Cache hits divided by cache-eligible calls",
        names::CACHE_ENTRIES => "Live response cache entries",
        names::CIRCUIT_BREAKER_STATE => "Breaker state: 0 closed, 0.5 half-open, 1 open",
        names::UPTIME_SECONDS => "Gateway uptime in seconds",
        names::ACTIVE_SESSIONS => "Live RPC sessions",
        names::RPC_REQUEST_DURATION_MS => "RPC call latency in milliseconds",
        names::UPSTREAM_REQUEST_DURATION_MS => "Upstream request latency in milliseconds",
        _ => "Gateway metric",
    }
}

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Samples retained per histogram for percentile estimation.
const HISTOGRAM_WINDOW: usize = 1_000;
/// Outcomes retained for windowed error-rate computation.
const OUTCOME_WINDOW: usize = 10_000;

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Register key: metric name plus sorted label set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct MetricKey {
    /// Metric family name.
    name: &'static str,
    /// Sorted `(label, value)` pairs.
    labels: Vec<(&'static str, String)>,
}

impl MetricKey {
    fn new(name: &'static str, labels: &[(&'static str, &str)]) -> Self {
        let mut labels: Vec<(&'static str, String)> =
            labels.iter().map(|(key, value)| (*key, (*value).to_string())).collect();
        labels.sort_unstable();
        Self {
            name,
            labels,
        }
    }

    /// Renders the key in Prometheus sample syntax.
    fn render(&self) -> String {
        if self.labels.is_empty() {
            return self.name.to_string();
        }
        let labels = self
            .labels
            .iter()
            .map(|(key, value)| format!("{key}=\"{}\"", escape_label(value)))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}{{{labels}}}", self.name)
    }
}

/// Escapes a label value for the text exposition.
fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

// ============================================================================
// SECTION: Collector
// ============================================================================

/// Process-wide metric registers.
///
/// # Invariants
/// - Counters are monotonic.
/// - Histogram windows never exceed [`HISTOGRAM_WINDOW`] samples.
#[derive(Debug)]
pub struct MetricsCollector {
    /// Monotonic counters.
    counters: Mutex<HashMap<MetricKey, u64>>,
    /// Point-in-time gauges.
    gauges: Mutex<HashMap<MetricKey, f64>>,
    /// Bounded latency sample windows.
    histograms: Mutex<HashMap<MetricKey, VecDeque<f64>>>,
    /// Recent RPC outcomes for windowed error rates.
    outcomes: Mutex<VecDeque<(Instant, bool)>>,
    /// Collector construction time.
    started_at: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            gauges: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
            outcomes: Mutex::new(VecDeque::new()),
            started_at: Instant::now(),
        }
    }

    /// Increments a labeled counter by one.
    pub fn inc_counter(&self, name: &'static str, labels: &[(&'static str, &str)]) {
        let key = MetricKey::new(name, labels);
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(key).or_insert(0) += 1;
        }
    }

    /// Sets a labeled gauge to the given value.
    pub fn set_gauge(&self, name: &'static str, labels: &[(&'static str, &str)], value: f64) {
        let key = MetricKey::new(name, labels);
        if let Ok(mut gauges) = self.gauges.lock() {
            gauges.insert(key, value);
        }
    }

    /// Records a latency sample in milliseconds.
    pub fn observe_duration_ms(
        &self,
        name: &'static str,
        labels: &[(&'static str, &str)],
        millis: f64,
    ) {
        let key = MetricKey::new(name, labels);
        if let Ok(mut histograms) = self.histograms.lock() {
            let window = histograms.entry(key).or_default();
            if window.len() == HISTOGRAM_WINDOW {
                window.pop_front();
            }
            window.push_back(millis);
        }
    }

    /// Records one RPC outcome for windowed error-rate evaluation.
    pub fn record_outcome(&self, success: bool) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            if outcomes.len() == OUTCOME_WINDOW {
                outcomes.pop_front();
            }
            outcomes.push_back((Instant::now(), success));
        }
    }

    /// Returns the error rate over the trailing window, if any traffic.
    #[must_use]
    pub fn error_rate(&self, window: Duration) -> Option<f64> {
        let outcomes = self.outcomes.lock().ok()?;
        let cutoff = Instant::now().checked_sub(window);
        let recent: Vec<bool> = outcomes
            .iter()
            .filter(|(at, _)| cutoff.map_or(true, |cutoff| *at >= cutoff))
            .map(|(_, success)| *success)
            .collect();
        if recent.is_empty() {
            return None;
        }
        let errors = recent.iter().filter(|success| !**success).count();
        Some(errors as f64 / recent.len() as f64)
    }

    /// Returns seconds since the collector was constructed.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Reads the current value of a counter family summed over labels.
    #[must_use]
    pub fn counter_total(&self, name: &'static str) -> u64 {
        self.counters.lock().map_or(0, |counters| {
            counters.iter().filter(|(key, _)| key.name == name).map(|(_, value)| *value).sum()
        })
    }

    /// Reads a gauge value for an exact label set.
    #[must_use]
    pub fn gauge_value(&self, name: &'static str, labels: &[(&'static str, &str)]) -> Option<f64> {
        let key = MetricKey::new(name, labels);
        self.gauges.lock().ok().and_then(|gauges| gauges.get(&key).copied())
    }

    /// Produces a point-in-time snapshot of every register.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.counters.lock().map_or_else(
            |_| BTreeMap::new(),
            |counters| counters.iter().map(|(key, value)| (key.render(), *value)).collect(),
        );
        let mut gauges: BTreeMap<String, f64> = self.gauges.lock().map_or_else(
            |_| BTreeMap::new(),
            |gauges| gauges.iter().map(|(key, value)| (key.render(), *value)).collect(),
        );
        gauges.insert(names::UPTIME_SECONDS.to_string(), self.uptime().as_secs_f64());
        let histograms = self.histograms.lock().map_or_else(
            |_| BTreeMap::new(),
            |histograms| {
                histograms
                    .iter()
                    .map(|(key, window)| (key.render(), HistogramSummary::from_window(window)))
                    .collect()
            },
        );
        MetricsSnapshot {
            uptime_seconds: self.uptime().as_secs_f64(),
            counters,
            gauges,
            histograms,
        }
    }

    /// Renders every register in the Prometheus text exposition format.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let mut seen: Vec<&'static str> = Vec::new();

        if let Ok(counters) = self.counters.lock() {
            let mut ordered: Vec<(&MetricKey, &u64)> = counters.iter().collect();
            ordered.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in ordered {
                write_family_header(&mut out, &mut seen, key.name, "counter");
                out.push_str(&format!("{} {value}\n", key.render()));
            }
        }

        if let Ok(gauges) = self.gauges.lock() {
            let mut ordered: Vec<(&MetricKey, &f64)> = gauges.iter().collect();
            ordered.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in ordered {
                write_family_header(&mut out, &mut seen, key.name, "gauge");
                out.push_str(&format!("{} {value}\n", key.render()));
            }
        }
        write_family_header(&mut out, &mut seen, names::UPTIME_SECONDS, "gauge");
        out.push_str(&format!("{} {}\n", names::UPTIME_SECONDS, self.uptime().as_secs_f64()));

        if let Ok(histograms) = self.histograms.lock() {
            let mut ordered: Vec<(&MetricKey, &VecDeque<f64>)> = histograms.iter().collect();
            ordered.sort_by(|a, b| a.0.cmp(b.0));
            for (key, window) in ordered {
                write_family_header(&mut out, &mut seen, key.name, "summary");
                let summary = HistogramSummary::from_window(window);
                let base = key.render();
                for (stat, value) in [
                    ("count", summary.count as f64),
                    ("min", summary.min),
                    ("max", summary.max),
                    ("avg", summary.avg),
                    ("p50", summary.p50),
                    ("p95", summary.p95),
                    ("p99", summary.p99),
                ] {
                    out.push_str(&render_stat_line(&base, key.name, stat, value));
                }
            }
        }
        out
    }
}

/// Writes a `# HELP` / `# TYPE` header once per family.
fn write_family_header(
    out: &mut String,
    seen: &mut Vec<&'static str>,
    name: &'static str,
    kind: &str,
) {
    if seen.contains(&name) {
        return;
    }
    seen.push(name);
    out.push_str(&format!("# HELP {name} {}\n", help_for(name)));
    out.push_str(&format!("# TYPE {name} {kind}\n"));
}

/// Renders one derived summary stat line, folding the stat into the name.
fn render_stat_line(rendered: &str, name: &str, stat: &str, value: f64) -> String {
    let stat_name = format!("{name}_{stat}");
    let line = rendered.replacen(name, &stat_name, 1);
    format!("{line} {value}\n")
}

// ============================================================================
// SECTION: Snapshot Shapes
// ============================================================================

/// Read-time summary of one histogram window.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HistogramSummary {
    /// Samples in the window.
    pub count: usize,
    /// Minimum sample.
    pub min: f64,
    /// Maximum sample.
    pub max: f64,
    /// Mean of the window.
    pub avg: f64,
    /// 50th percentile.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
}

impl HistogramSummary {
    /// Computes the summary for one sample window.
    #[must_use]
    fn from_window(window: &VecDeque<f64>) -> Self {
        if window.is_empty() {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                avg: 0.0,
                p50: 0.0,
                p95: 0.0,
                p99: 0.0,
            };
        }
        let mut sorted: Vec<f64> = window.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            avg: sum / count as f64,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

/// Nearest-rank percentile over a sorted window.
fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() as f64 * quantile).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}

/// Point-in-time view of every register, serialized for `/metrics/json`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since process start.
    pub uptime_seconds: f64,
    /// Counter values keyed by rendered sample name.
    pub counters: BTreeMap<String, u64>,
    /// Gauge values keyed by rendered sample name.
    pub gauges: BTreeMap<String, f64>,
    /// Histogram summaries keyed by rendered sample name.
    pub histograms: BTreeMap<String, HistogramSummary>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use std::time::Duration;

    use super::*;

    #[test]
    fn counters_accumulate_per_label_set() {
        let collector = MetricsCollector::new();
        collector.inc_counter(names::CACHE_HITS_TOTAL, &[("tool", "list_ip_spaces")]);
        collector.inc_counter(names::CACHE_HITS_TOTAL, &[("tool", "list_ip_spaces")]);
        collector.inc_counter(names::CACHE_HITS_TOTAL, &[("tool", "list_subnets")]);
        assert_eq!(collector.counter_total(names::CACHE_HITS_TOTAL), 3);
        let snapshot = collector.snapshot();
        assert_eq!(
            snapshot.counters.get("cache_hits_total{tool=\"list_ip_spaces\"}"),
            Some(&2)
        );
    }

    #[test]
    fn label_order_does_not_split_registers() {
        let collector = MetricsCollector::new();
        collector.inc_counter(names::RPC_REQUESTS_TOTAL, &[("tool", "x"), ("status", "ok")]);
        collector.inc_counter(names::RPC_REQUESTS_TOTAL, &[("status", "ok"), ("tool", "x")]);
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.counters.len(), 1);
        assert_eq!(snapshot.counters.values().next(), Some(&2));
    }

    #[test]
    fn histogram_summary_percentiles() {
        let collector = MetricsCollector::new();
        for millis in 1..=100 {
            collector.observe_duration_ms(
                names::RPC_REQUEST_DURATION_MS,
                &[("tool", "list_subnets")],
                f64::from(millis),
            );
        }
        let snapshot = collector.snapshot();
        let summary = snapshot
            .histograms
            .get("rpc_request_duration_ms{tool=\"list_subnets\"}")
            .unwrap();
        assert_eq!(summary.count, 100);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 100.0);
        assert_eq!(summary.p50, 50.0);
        assert_eq!(summary.p95, 95.0);
        assert_eq!(summary.p99, 99.0);
    }

    #[test]
    fn histogram_window_is_bounded() {
        let collector = MetricsCollector::new();
        for millis in 0..(HISTOGRAM_WINDOW + 500) {
            collector.observe_duration_ms(
                names::UPSTREAM_REQUEST_DURATION_MS,
                &[("service", "infoblox_api"), ("path", "/ipam/subnet")],
                millis as f64,
            );
        }
        let snapshot = collector.snapshot();
        let summary = snapshot.histograms.values().next().unwrap();
        assert_eq!(summary.count, HISTOGRAM_WINDOW);
        assert_eq!(summary.min, 500.0);
    }

    #[test]
    fn prometheus_exposition_carries_help_and_type() {
        let collector = MetricsCollector::new();
        collector.inc_counter(names::RPC_REQUESTS_TOTAL, &[("tool", "x"), ("status", "ok")]);
        collector.set_gauge(
            names::CIRCUIT_BREAKER_STATE,
            &[("service", "infoblox_api")],
            0.0,
        );
        collector.observe_duration_ms(
            names::RPC_REQUEST_DURATION_MS,
            &[("tool", "x")],
            12.5,
        );
        let text = collector.render_prometheus();
        assert!(text.contains("# HELP rpc_requests_total"));
        assert!(text.contains("# TYPE rpc_requests_total counter"));
        assert!(text.contains("rpc_requests_total{status=\"ok\",tool=\"x\"} 1"));
        assert!(text.contains("# TYPE circuit_breaker_state gauge"));
        assert!(text.contains("circuit_breaker_state{service=\"infoblox_api\"} 0"));
        assert!(text.contains("rpc_request_duration_ms_p95{tool=\"x\"} 12.5"));
        assert!(text.contains("uptime_seconds"));
    }

    #[test]
    fn error_rate_reflects_recent_outcomes() {
        let collector = MetricsCollector::new();
        assert!(collector.error_rate(Duration::from_secs(300)).is_none());
        for _ in 0..9 {
            collector.record_outcome(true);
        }
        collector.record_outcome(false);
        let rate = collector.error_rate(Duration::from_secs(300)).unwrap();
        assert!((rate - 0.1).abs() < f64::EPSILON);
    }
}
