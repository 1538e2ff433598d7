// crates/bloxgate-observe/src/spans.rs
// ============================================================================
// Module: Trace Spans
// Description: Span records, sinks, and the HTTP batch exporter.
// Purpose: Export per-call traces to a collector, or drop them cheaply.
// Dependencies: rand, reqwest, serde_json, tokio
// ============================================================================

//! ## Overview
//! One span per RPC call, one child span per upstream request. Spans flow
//! through the [`SpanSink`] trait: the HTTP exporter batches them onto a
//! background task, the noop sink discards them. Recording never blocks the
//! caller; a full exporter queue drops the span.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rand::Rng;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exporter channel capacity; sends beyond it drop the span.
const EXPORT_QUEUE_DEPTH: usize = 1_024;
/// Spans per exported batch.
const EXPORT_BATCH_SIZE: usize = 64;
/// Maximum time a partial batch waits before flushing.
const EXPORT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
/// Deadline for draining the exporter at shutdown.
const EXPORT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Span Records
// ============================================================================

/// Terminal status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    /// The operation completed successfully.
    Ok,
    /// The operation failed.
    Error,
    /// The operation was cancelled before completion.
    Cancelled,
}

/// One finished span, ready for export.
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    /// Trace identifier shared by a call and its children.
    pub trace_id: String,
    /// Span identifier.
    pub span_id: String,
    /// Parent span identifier, absent for call roots.
    pub parent_span_id: Option<String>,
    /// Operation name.
    pub name: String,
    /// Wall-clock start in milliseconds since the epoch.
    pub start_unix_ms: u64,
    /// Span duration in milliseconds.
    pub duration_ms: f64,
    /// Terminal status.
    pub status: SpanStatus,
    /// Attribute key/value pairs.
    pub attributes: BTreeMap<String, Value>,
}

/// Destination for finished spans.
pub trait SpanSink: Send + Sync {
    /// Accepts one finished span; must not block.
    fn record(&self, span: SpanRecord);
}

/// Sink that discards every span.
pub struct NoopSpanSink;

impl SpanSink for NoopSpanSink {
    fn record(&self, _span: SpanRecord) {}
}

// ============================================================================
// SECTION: Live Spans
// ============================================================================

/// Identifiers linking a child span to its parent across components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanContext {
    /// Trace identifier.
    pub trace_id: String,
    /// Span identifier of the parent.
    pub span_id: String,
}

/// In-flight span that finishes into a sink.
///
/// # Invariants
/// - `finish` is called at most once; dropping without finishing records
///   the span as cancelled.
pub struct Span {
    /// Sink the finished record goes to.
    sink: Arc<dyn SpanSink>,
    /// Record under construction; taken on finish.
    record: Option<SpanRecord>,
    /// Start instant for duration measurement.
    started: Instant,
}

impl Span {
    /// Opens a root span for an RPC call.
    #[must_use]
    pub fn root(sink: Arc<dyn SpanSink>, name: &str) -> Self {
        Self::open(sink, name, random_hex(16), None)
    }

    /// Opens a child span under this span.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let (trace_id, parent) = self.record.as_ref().map_or_else(
            || (random_hex(16), None),
            |record| (record.trace_id.clone(), Some(record.span_id.clone())),
        );
        Self::open(Arc::clone(&self.sink), name, trace_id, parent)
    }

    /// Opens a child span under a context handed across a component seam.
    #[must_use]
    pub fn with_parent(sink: Arc<dyn SpanSink>, parent: &SpanContext, name: &str) -> Self {
        Self::open(sink, name, parent.trace_id.clone(), Some(parent.span_id.clone()))
    }

    /// Returns this span's identifiers for parenting children elsewhere.
    #[must_use]
    pub fn context(&self) -> Option<SpanContext> {
        self.record.as_ref().map(|record| SpanContext {
            trace_id: record.trace_id.clone(),
            span_id: record.span_id.clone(),
        })
    }

    fn open(
        sink: Arc<dyn SpanSink>,
        name: &str,
        trace_id: String,
        parent_span_id: Option<String>,
    ) -> Self {
        let start_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64);
        Self {
            sink,
            record: Some(SpanRecord {
                trace_id,
                span_id: random_hex(8),
                parent_span_id,
                name: name.to_string(),
                start_unix_ms,
                duration_ms: 0.0,
                status: SpanStatus::Cancelled,
                attributes: BTreeMap::new(),
            }),
            started: Instant::now(),
        }
    }

    /// Sets one attribute on the span.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<Value>) {
        if let Some(record) = self.record.as_mut() {
            record.attributes.insert(key.to_string(), value.into());
        }
    }

    /// Finishes the span with a terminal status.
    pub fn finish(mut self, status: SpanStatus) {
        if let Some(mut record) = self.record.take() {
            record.status = status;
            record.duration_ms = self.started.elapsed().as_secs_f64() * 1_000.0;
            self.sink.record(record);
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        // A dropped span means the call task was cancelled mid-flight.
        if let Some(mut record) = self.record.take() {
            record.status = SpanStatus::Cancelled;
            record.duration_ms = self.started.elapsed().as_secs_f64() * 1_000.0;
            self.sink.record(record);
        }
    }
}

/// Generates a lowercase hex identifier of `bytes` random bytes.
fn random_hex(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(bytes * 2);
    for _ in 0..bytes {
        out.push_str(&format!("{:02x}", rng.gen::<u8>()));
    }
    out
}

// ============================================================================
// SECTION: HTTP Exporter
// ============================================================================

/// Exporter that POSTs span batches to a collector endpoint.
pub struct HttpSpanExporter {
    /// Channel into the background export task; taken at shutdown.
    tx: std::sync::Mutex<Option<mpsc::Sender<SpanRecord>>>,
    /// Export task handle, awaited at shutdown.
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl HttpSpanExporter {
    /// Starts the exporter against a collector endpoint.
    ///
    /// A boot-scoped instance id is attached to every batch so a collector
    /// can distinguish gateway restarts.
    #[must_use]
    pub fn start(endpoint: String) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<SpanRecord>(EXPORT_QUEUE_DEPTH);
        let instance_id = OsRng.next_u64();
        let client = reqwest::Client::new();
        let task = tokio::spawn(async move {
            let mut batch: Vec<SpanRecord> = Vec::with_capacity(EXPORT_BATCH_SIZE);
            loop {
                let received =
                    tokio::time::timeout(EXPORT_FLUSH_INTERVAL, rx.recv()).await;
                match received {
                    Ok(Some(span)) => {
                        batch.push(span);
                        if batch.len() < EXPORT_BATCH_SIZE {
                            continue;
                        }
                    }
                    Ok(None) => {
                        flush_batch(&client, &endpoint, instance_id, &mut batch).await;
                        return;
                    }
                    Err(_) => {}
                }
                flush_batch(&client, &endpoint, instance_id, &mut batch).await;
            }
        });
        Arc::new(Self {
            tx: std::sync::Mutex::new(Some(tx)),
            task: tokio::sync::Mutex::new(Some(task)),
        })
    }

    /// Drains pending spans and stops the export task.
    pub async fn shutdown(&self) {
        // Dropping the sender closes the channel; the task flushes and exits.
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(EXPORT_SHUTDOWN_DEADLINE, handle).await;
        }
    }
}

impl SpanSink for HttpSpanExporter {
    fn record(&self, span: SpanRecord) {
        // Full queue or closed exporter: drop the span, never stall a call.
        if let Ok(tx) = self.tx.lock() {
            if let Some(tx) = tx.as_ref() {
                let _ = tx.try_send(span);
            }
        }
    }
}

/// Sends one batch to the collector, logging failures.
async fn flush_batch(
    client: &reqwest::Client,
    endpoint: &str,
    instance_id: u64,
    batch: &mut Vec<SpanRecord>,
) {
    if batch.is_empty() {
        return;
    }
    let payload = serde_json::json!({
        "instance_id": format!("{instance_id:016x}"),
        "spans": batch,
    });
    let result = client.post(endpoint).json(&payload).send().await;
    if let Err(err) = result {
        tracing::debug!(event = "trace_export_failed", error = %err);
    }
    batch.clear();
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct CaptureSink {
        records: Mutex<Vec<SpanRecord>>,
    }

    impl SpanSink for CaptureSink {
        fn record(&self, span: SpanRecord) {
            self.records.lock().unwrap().push(span);
        }
    }

    #[test]
    fn finished_span_carries_attributes_and_status() {
        let sink = Arc::new(CaptureSink::default());
        let mut span = Span::root(sink.clone(), "call_tool");
        span.set_attribute("tool", json!("list_subnets"));
        span.set_attribute("cache_outcome", json!("miss"));
        span.finish(SpanStatus::Ok);

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "call_tool");
        assert_eq!(records[0].status, SpanStatus::Ok);
        assert_eq!(records[0].attributes.get("tool"), Some(&json!("list_subnets")));
        assert!(records[0].parent_span_id.is_none());
    }

    #[test]
    fn child_span_shares_trace_and_links_parent() {
        let sink = Arc::new(CaptureSink::default());
        let root = Span::root(sink.clone(), "call_tool");
        let child = root.child("upstream_request");
        child.finish(SpanStatus::Error);
        root.finish(SpanStatus::Ok);

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].trace_id, records[1].trace_id);
        assert_eq!(records[0].parent_span_id.as_deref(), Some(records[1].span_id.as_str()));
    }

    #[test]
    fn dropped_span_records_cancelled() {
        let sink = Arc::new(CaptureSink::default());
        {
            let _span = Span::root(sink.clone(), "call_tool");
        }
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SpanStatus::Cancelled);
    }
}
