// crates/bloxgate-upstream/src/client.rs
// ============================================================================
// Module: Upstream HTTP Client
// Description: reqwest-backed implementation of the upstream transport.
// Purpose: Authenticated single-shot requests with typed convenience calls.
// Dependencies: reqwest, serde_json, async-trait
// ============================================================================

//! ## Overview
//! One pooled HTTPS client for all four upstream services. Auth is a fixed
//! `Authorization: Token <key>` header; bodies are JSON. The client applies
//! connect and read timeouts but never retries; retry, breaker, and cache
//! policy live in the resilience pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use serde_json::json;

use crate::error::UpstreamError;
use crate::request::HttpMethod;
use crate::request::UpstreamRequest;
use crate::request::UpstreamResponse;
use crate::request::UpstreamTransport;
use crate::service::ServiceKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// TCP connect timeout for upstream requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Full-request read timeout for upstream requests.
const READ_TIMEOUT: Duration = Duration::from_secs(30);
/// User agent reported to the upstream.
const USER_AGENT: &str = concat!("bloxgate/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SECTION: Client
// ============================================================================

/// Pooled HTTPS client bound to one base URL and credential.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    /// Shared connection pool.
    http: Client,
    /// Base URL without trailing slash.
    base_url: String,
}

impl UpstreamClient {
    /// Builds a client for the given base URL and API credential.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Transport`] when the credential is not a
    /// valid header value or the HTTP client cannot be constructed.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Token {api_key}"))
            .map_err(|_| UpstreamError::Transport {
                cause: "credential is not a valid header value".to_string(),
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|err| UpstreamError::Transport {
                cause: format!("http client build failed: {err}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Typed convenience calls
    // ------------------------------------------------------------------

    /// Lists a collection with the upstream `_limit`/`_filter` convention.
    #[must_use]
    pub fn list_collection(
        service: ServiceKind,
        path: &str,
        filter: Option<&str>,
        limit: u64,
    ) -> UpstreamRequest {
        let mut request =
            UpstreamRequest::get(service, path).with_query("_limit", limit.to_string());
        if let Some(filter) = filter {
            request = request.with_query("_filter", filter);
        }
        request
    }

    /// Fetches one resource by its upstream identifier.
    #[must_use]
    pub fn get_resource(service: ServiceKind, path: &str, id: &str) -> UpstreamRequest {
        UpstreamRequest::get(service, resource_path(path, id))
    }

    /// Creates a resource from a JSON document.
    #[must_use]
    pub fn create_resource(service: ServiceKind, path: &str, body: Value) -> UpstreamRequest {
        UpstreamRequest::post(service, path, body)
    }

    /// Applies a partial update to one resource.
    #[must_use]
    pub fn update_resource(
        service: ServiceKind,
        path: &str,
        id: &str,
        updates: Value,
    ) -> UpstreamRequest {
        UpstreamRequest {
            service,
            method: HttpMethod::Patch,
            path: resource_path(path, id),
            query: Vec::new(),
            body: Some(updates),
        }
    }

    /// Deletes one resource.
    #[must_use]
    pub fn delete_resource(service: ServiceKind, path: &str, id: &str) -> UpstreamRequest {
        UpstreamRequest {
            service,
            method: HttpMethod::Delete,
            path: resource_path(path, id),
            query: Vec::new(),
            body: None,
        }
    }

    /// Submits a composite VPN document to the consolidated endpoint.
    ///
    /// The upstream treats the document as one transaction; 409/429 answers
    /// mean "in progress, try again" and are retried by the pipeline.
    #[must_use]
    pub fn consolidated_configure(payload: Value) -> UpstreamRequest {
        UpstreamRequest::post(ServiceKind::NiosxaasApi, "/consolidated/configure", payload)
    }
}

/// Joins a collection path and an upstream identifier.
///
/// Upstream identifiers are path-shaped (`ipam/subnet/<uuid>`), so the id is
/// appended verbatim after a separator. An empty base path means the id is
/// already a full service-relative path.
#[must_use]
pub(crate) fn resource_path(path: &str, id: &str) -> String {
    let id = id.trim_matches('/');
    if path.is_empty() {
        format!("/{id}")
    } else {
        format!("{}/{id}", path.trim_end_matches('/'))
    }
}

// ============================================================================
// SECTION: Transport Implementation
// ============================================================================

#[async_trait]
impl UpstreamTransport for UpstreamClient {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = format!("{}{}", self.base_url, request.full_path());
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };
        let mut builder = self.http.request(method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        // DELETE must go out without a JSON content type; the upstream
        // answers 501 to bodyless requests that carry one.
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(classify_send_error)?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let bytes = response.bytes().await.map_err(|err| UpstreamError::Transport {
            cause: format!("response read failed: {err}"),
        })?;
        let body = decode_body(&bytes);

        classify_status(status, retry_after, body)
    }
}

/// Maps reqwest send failures into the transport taxonomy.
fn classify_send_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Transport {
            cause: err.to_string(),
        }
    }
}

/// Classifies a completed response by status family.
fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: Value,
) -> Result<UpstreamResponse, UpstreamError> {
    if status.is_success() {
        return Ok(UpstreamResponse {
            status: status.as_u16(),
            retry_after,
            body,
        });
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(UpstreamError::RateLimited {
            retry_after,
        });
    }
    if status.is_client_error() {
        return Err(UpstreamError::ClientError {
            status: status.as_u16(),
            body,
            retry_after,
        });
    }
    Err(UpstreamError::ServerError {
        status: status.as_u16(),
        body,
    })
}

/// Parses the `Retry-After` header as whole seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Decodes a response body, normalizing empty payloads.
///
/// DELETE acknowledgments commonly come back as 204, an empty body, or a
/// bare `{}`; all of them normalize to `{"success": true}`.
fn decode_body(bytes: &[u8]) -> Value {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "{}" {
        return json!({"success": true});
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use reqwest::StatusCode;
    use serde_json::json;

    use super::classify_status;
    use super::decode_body;
    use super::resource_path;
    use crate::error::UpstreamError;

    #[test]
    fn resource_path_appends_path_shaped_ids() {
        assert_eq!(
            resource_path("/ipam/subnet", "ipam/subnet/abc-123"),
            "/ipam/subnet/ipam/subnet/abc-123"
        );
        assert_eq!(resource_path("", "dns/record/abc"), "/dns/record/abc");
    }

    #[test]
    fn empty_and_brace_bodies_normalize_to_success() {
        assert_eq!(decode_body(b""), json!({"success": true}));
        assert_eq!(decode_body(b"  {}  "), json!({"success": true}));
        assert_eq!(decode_body(b"{\"id\": \"x\"}"), json!({"id": "x"}));
    }

    #[test]
    fn non_json_error_bodies_survive_as_strings() {
        assert_eq!(decode_body(b"upstream exploded"), json!("upstream exploded"));
    }

    #[test]
    fn status_families_classify() {
        assert!(classify_status(StatusCode::OK, None, json!({})).is_ok());
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None, json!({})),
            Err(UpstreamError::ClientError {
                status: 404,
                ..
            })
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, None, json!({})),
            Err(UpstreamError::RateLimited {
                ..
            })
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, json!({})),
            Err(UpstreamError::ServerError {
                status: 502,
                ..
            })
        ));
    }
}
