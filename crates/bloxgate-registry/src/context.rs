// crates/bloxgate-registry/src/context.rs
// ============================================================================
// Module: Tool Context
// Description: Per-call context handed from the transport into handlers.
// Purpose: Thread the pipeline, correlation id, and cache scope per call.
// Dependencies: bloxgate-resilience, bloxgate-upstream
// ============================================================================

//! ## Overview
//! The transport builds one [`ToolContext`] per RPC call; the registry
//! narrows it to a [`CallScope`] carrying the tool's resolved cache policy
//! and argument fingerprint. Handlers only see the scope, so cache keying
//! and policy resolution cannot diverge between tools.

use std::sync::Arc;
use std::time::Duration;

use bloxgate_observe::SpanContext;
use bloxgate_resilience::CallPipeline;
use bloxgate_resilience::PipelineRequest;
use bloxgate_upstream::UpstreamRequest;
use serde_json::Value;

use crate::error::ToolError;

/// Per-call dependencies owned by the transport.
#[derive(Clone)]
pub struct ToolContext {
    /// The resilience pipeline every upstream call goes through.
    pub pipeline: Arc<CallPipeline>,
    /// Correlation id for logs, metrics, and spans.
    pub correlation_id: String,
    /// Parent span of the call, when tracing is active.
    pub span_parent: Option<SpanContext>,
    /// Progress sink; the transport turns messages into progress frames.
    pub progress: Option<tokio::sync::mpsc::Sender<String>>,
}

impl ToolContext {
    /// Emits one progress message when the transport is listening.
    pub async fn emit_progress(&self, message: &str) {
        if let Some(progress) = &self.progress {
            let _ = progress.send(message.to_string()).await;
        }
    }
}

/// One tool invocation's cache scope.
///
/// # Invariants
/// - `fingerprint` is present iff the tool is a cacheable read.
pub struct CallScope<'a> {
    /// Tool name, used for cache and metric keys.
    pub(crate) tool: &'a str,
    /// Resolved cache TTL for this tool.
    pub(crate) cache_ttl: Option<Duration>,
    /// Canonical fingerprint of the defaulted arguments.
    pub(crate) fingerprint: Option<String>,
    /// The transport-owned call context.
    pub(crate) ctx: &'a ToolContext,
}

impl CallScope<'_> {
    /// Emits one progress message on the call's session stream.
    pub async fn emit_progress(&self, message: &str) {
        self.ctx.emit_progress(message).await;
    }

    /// Issues the tool's principal upstream call through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Call`] for pipeline and upstream failures.
    pub async fn upstream(&self, request: UpstreamRequest) -> Result<Value, ToolError> {
        self.execute(self.fingerprint.clone(), request).await
    }

    /// Issues an auxiliary upstream call with its own cache key.
    ///
    /// Derived reads combine several upstream reads; each gets a distinct
    /// fingerprint so cached sub-results cannot collide.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Call`] for pipeline and upstream failures.
    pub async fn upstream_keyed(
        &self,
        discriminator: &str,
        request: UpstreamRequest,
    ) -> Result<Value, ToolError> {
        let fingerprint = self
            .fingerprint
            .as_ref()
            .map(|fingerprint| format!("{fingerprint}:{discriminator}"));
        self.execute(fingerprint, request).await
    }

    async fn execute(
        &self,
        fingerprint: Option<String>,
        request: UpstreamRequest,
    ) -> Result<Value, ToolError> {
        let call = PipelineRequest {
            tool: self.tool.to_string(),
            request,
            cache_ttl: self.cache_ttl,
            fingerprint,
            correlation_id: self.ctx.correlation_id.clone(),
            span_parent: self.ctx.span_parent.clone(),
        };
        Ok(self.ctx.pipeline.execute(call).await?)
    }
}
