// crates/bloxgate-upstream/src/request.rs
// ============================================================================
// Module: Upstream Requests
// Description: Request/response shapes and the transport seam.
// Purpose: Decouple the pipeline and tests from the concrete HTTP client.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! [`UpstreamRequest`] describes one upstream call independent of how it is
//! transported. [`UpstreamTransport`] is implemented by the production
//! [`crate::UpstreamClient`] and by in-memory fakes in tests, which is how
//! the resilience suites exercise breaker and retry behavior without a
//! network.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::UpstreamError;
use crate::service::ServiceKind;

/// HTTP methods used against the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Collection and resource reads.
    Get,
    /// Resource creation and compound operations.
    Post,
    /// Full-document replacement.
    Put,
    /// Partial update.
    Patch,
    /// Resource deletion.
    Delete,
}

impl HttpMethod {
    /// Returns the wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// One upstream call, independent of transport.
///
/// # Invariants
/// - `path` is service-relative and starts with `/`.
/// - `body` is `None` for GET and DELETE requests.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    /// Target service family.
    pub service: ServiceKind,
    /// HTTP method.
    pub method: HttpMethod,
    /// Service-relative path, e.g. `/ipam/subnet`.
    pub path: String,
    /// Query parameters in append order.
    pub query: Vec<(String, String)>,
    /// JSON request body, when the method carries one.
    pub body: Option<Value>,
}

impl UpstreamRequest {
    /// Creates a bodyless GET request.
    #[must_use]
    pub fn get(service: ServiceKind, path: impl Into<String>) -> Self {
        Self {
            service,
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a POST request with a JSON body.
    #[must_use]
    pub fn post(service: ServiceKind, path: impl Into<String>, body: Value) -> Self {
        Self {
            service,
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Returns the full upstream path including the service prefix.
    #[must_use]
    pub fn full_path(&self) -> String {
        format!("{}{}", self.service.path_prefix(), self.path)
    }
}

/// Successful upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Parsed `Retry-After` header, when present.
    pub retry_after: Option<Duration>,
    /// Decoded JSON body; empty bodies normalize to `{"success": true}`.
    pub body: Value,
}

/// Transport seam between the pipeline and the HTTP layer.
///
/// Implementations perform exactly one request per call: no retries, no
/// caching. `Ok` is returned only for 2xx responses.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Sends one request and classifies the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] for any non-2xx response or I/O failure.
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::HttpMethod;
    use super::UpstreamRequest;
    use crate::service::ServiceKind;

    #[test]
    fn full_path_includes_service_prefix() {
        let request = UpstreamRequest::get(ServiceKind::InfobloxApi, "/ipam/subnet");
        assert_eq!(request.full_path(), "/api/ddi/v1/ipam/subnet");
    }

    #[test]
    fn post_carries_body() {
        let request = UpstreamRequest::post(
            ServiceKind::NiosxaasApi,
            "/consolidated/configure",
            json!({"universal_service": {}}),
        );
        assert_eq!(request.method, HttpMethod::Post);
        assert!(request.body.is_some());
    }

    #[test]
    fn query_preserves_append_order() {
        let request = UpstreamRequest::get(ServiceKind::InfobloxApi, "/ipam/subnet")
            .with_query("_limit", "100")
            .with_query("_filter", "name=='lab'");
        assert_eq!(request.query[0].0, "_limit");
        assert_eq!(request.query[1].0, "_filter");
    }
}
