// crates/bloxgate-resilience/src/lib.rs
// ============================================================================
// Module: Resilience Pipeline
// Description: Timeout, breaker, cache, and retry composition for calls.
// Purpose: Route every tool call through one ordered policy pipeline.
// Dependencies: bloxgate-upstream, bloxgate-observe, tokio
// ============================================================================

//! ## Overview
//! Every upstream invocation goes through the same ordered stages: deadline
//! guard, circuit breaker gate, cache lookup, the HTTP call, retry for
//! retryable failures, breaker update, cache insert, and telemetry
//! emission. The pipeline owns the breakers and the cache; handlers only
//! describe the call.

#![forbid(unsafe_code)]

mod breaker;
mod cache;
mod error;
mod keys;
mod pipeline;
mod retry;

pub use breaker::Admission;
pub use breaker::BreakerConfig;
pub use breaker::BreakerSnapshot;
pub use breaker::BreakerState;
pub use breaker::CircuitBreakers;
pub use cache::CacheSettings;
pub use cache::ToolCache;
pub use error::CallError;
pub use keys::FingerprintError;
pub use keys::argument_fingerprint;
pub use pipeline::CallPipeline;
pub use pipeline::PipelineRequest;
pub use retry::RetryPolicy;
