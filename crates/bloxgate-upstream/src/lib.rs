// crates/bloxgate-upstream/src/lib.rs
// ============================================================================
// Module: Upstream Client
// Description: Typed async REST client for the Infoblox cloud APIs.
// Purpose: Issue authenticated single-shot HTTP requests for the pipeline.
// Dependencies: reqwest, serde_json, async-trait
// ============================================================================

//! ## Overview
//! This crate is the lowest layer of the gateway: one authenticated HTTPS
//! request per call, no retries, no caching, no metrics. Failures are
//! classified into a typed taxonomy the resilience pipeline acts on. The
//! [`UpstreamTransport`] trait is the seam tests and the pipeline consume;
//! [`UpstreamClient`] is the production implementation.

#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod service;

pub use client::UpstreamClient;
pub use error::UpstreamError;
pub use request::HttpMethod;
pub use request::UpstreamRequest;
pub use request::UpstreamResponse;
pub use request::UpstreamTransport;
pub use service::ServiceKind;
