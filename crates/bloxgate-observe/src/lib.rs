// crates/bloxgate-observe/src/lib.rs
// ============================================================================
// Module: Observability
// Description: Metrics, span export, health evaluation, and log bootstrap.
// Purpose: One process-wide view of gateway behavior for humans and scrapers.
// Dependencies: tracing, tracing-subscriber, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The collector owns every counter, gauge, and latency histogram the
//! gateway emits; the admin surface and the health evaluator only read from
//! it. Spans are recorded through a sink trait so deployments without a
//! collector endpoint drop them at a channel send. Nothing here takes a
//! lock across an await point.

#![forbid(unsafe_code)]

mod health;
mod logging;
mod metrics;
mod spans;

pub use health::BreakerHealthView;
pub use health::BreakerStateLabel;
pub use health::HealthEvaluator;
pub use health::HealthMetrics;
pub use health::HealthReport;
pub use health::HealthStatus;
pub use logging::LoggingError;
pub use logging::init_logging;
pub use metrics::HistogramSummary;
pub use metrics::MetricsCollector;
pub use metrics::MetricsSnapshot;
pub use metrics::names;
pub use spans::HttpSpanExporter;
pub use spans::NoopSpanSink;
pub use spans::Span;
pub use spans::SpanContext;
pub use spans::SpanRecord;
pub use spans::SpanSink;
pub use spans::SpanStatus;
