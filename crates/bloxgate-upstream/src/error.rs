// crates/bloxgate-upstream/src/error.rs
// ============================================================================
// Module: Upstream Errors
// Description: Typed failure taxonomy for upstream HTTP calls.
// Purpose: Classify failures so the pipeline can gate, retry, and report.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! The client maps every failed call into one of five variants. The split
//! drives the resilience pipeline: 429s and transport failures are
//! retryable, 4xx are caller bugs, 5xx and transport failures feed the
//! circuit breaker. The client itself never retries.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Failure taxonomy for a single upstream HTTP call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// 4xx response other than 429; not retryable except 409 conflicts.
    #[error("upstream client error: http {status}")]
    ClientError {
        /// HTTP status code.
        status: u16,
        /// Response body as returned by the upstream.
        body: Value,
        /// Parsed `Retry-After` header when the upstream sent one.
        retry_after: Option<Duration>,
    },
    /// 5xx response; retryable from the caller's point of view.
    #[error("upstream server error: http {status}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body as returned by the upstream.
        body: Value,
    },
    /// 429 response; retry after the indicated delay.
    #[error("upstream rate limited")]
    RateLimited {
        /// Parsed `Retry-After` header when the upstream sent one.
        retry_after: Option<Duration>,
    },
    /// Connection, DNS, or protocol failure before a response arrived.
    #[error("upstream transport error: {cause}")]
    Transport {
        /// Human-readable failure cause.
        cause: String,
    },
    /// The configured deadline elapsed before the response completed.
    #[error("upstream request timed out")]
    Timeout,
}

impl UpstreamError {
    /// Returns the HTTP status for response-bearing variants.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::ClientError {
                status, ..
            }
            | Self::ServerError {
                status, ..
            } => Some(*status),
            Self::RateLimited {
                ..
            } => Some(429),
            Self::Transport {
                ..
            }
            | Self::Timeout => None,
        }
    }

    /// Returns a stable label for logs and metric labels.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::ClientError {
                ..
            } => "client_error",
            Self::ServerError {
                ..
            } => "server_error",
            Self::RateLimited {
                ..
            } => "rate_limited",
            Self::Transport {
                ..
            } => "transport_error",
            Self::Timeout => "timeout",
        }
    }

    /// Returns the retry delay requested by the upstream, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after,
            }
            | Self::ClientError {
                retry_after, ..
            } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::UpstreamError;

    #[test]
    fn status_reported_per_variant() {
        let err = UpstreamError::ServerError {
            status: 503,
            body: json!({}),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(
            UpstreamError::RateLimited {
                retry_after: None
            }
            .status(),
            Some(429)
        );
        assert_eq!(UpstreamError::Timeout.status(), None);
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(UpstreamError::Timeout.kind_label(), "timeout");
        assert_eq!(
            UpstreamError::Transport {
                cause: "refused".to_string()
            }
            .kind_label(),
            "transport_error"
        );
    }
}
