// crates/bloxgate-resilience/src/error.rs
// ============================================================================
// Module: Pipeline Errors
// Description: Outward error taxonomy of the resilience pipeline.
// Purpose: Give handlers and the transport one stable failure vocabulary.
// Dependencies: bloxgate-upstream, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The pipeline folds upstream failures, breaker rejections, and deadline
//! expiry into one taxonomy. Each variant carries a stable kind label and a
//! retryability verdict the transport serializes into error frames.

use std::time::Duration;

use bloxgate_upstream::ServiceKind;
use bloxgate_upstream::UpstreamError;
use serde_json::Value;
use thiserror::Error;

/// Failure taxonomy surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum CallError {
    /// The breaker for the target service is open.
    #[error("circuit open for {service}")]
    CircuitOpen {
        /// Service whose breaker rejected the call.
        service: ServiceKind,
        /// Time until the next probe is admitted.
        retry_in: Duration,
    },
    /// The per-attempt deadline elapsed.
    #[error("upstream call timed out")]
    Timeout,
    /// Rate limiting persisted through the retry budget.
    #[error("upstream rate limited")]
    RateLimited {
        /// Delay requested by the upstream, when present.
        retry_after: Option<Duration>,
    },
    /// Non-retryable 4xx from the upstream.
    #[error("upstream client error: http {status}")]
    UpstreamClient {
        /// HTTP status code.
        status: u16,
        /// Upstream response body.
        body: Value,
    },
    /// 5xx from the upstream.
    #[error("upstream server error: http {status}")]
    UpstreamServer {
        /// HTTP status code.
        status: u16,
    },
    /// Transport failure that survived the retry budget.
    #[error("upstream transport error: {cause}")]
    Transport {
        /// Human-readable failure cause.
        cause: String,
    },
    /// The call was cancelled by session close or disconnect.
    #[error("call cancelled")]
    Cancelled,
}

impl CallError {
    /// Returns the stable kind label for frames, logs, and metrics.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::CircuitOpen {
                ..
            } => "circuit_open",
            Self::Timeout => "timeout",
            Self::RateLimited {
                ..
            } => "rate_limited",
            Self::UpstreamClient {
                ..
            } => "upstream_client_error",
            Self::UpstreamServer {
                ..
            } => "upstream_server_error",
            Self::Transport {
                ..
            } => "transport_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns whether the RPC client may retry this call.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        match self {
            Self::CircuitOpen {
                ..
            }
            | Self::Timeout
            | Self::RateLimited {
                ..
            }
            | Self::UpstreamServer {
                ..
            }
            | Self::Transport {
                ..
            } => true,
            Self::UpstreamClient {
                ..
            }
            | Self::Cancelled => false,
        }
    }

    /// Returns the retry delay to advertise to the RPC client.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen {
                retry_in, ..
            } => Some(*retry_in),
            Self::RateLimited {
                retry_after,
            } => *retry_after,
            _ => None,
        }
    }

    /// Folds a final upstream failure into the pipeline taxonomy.
    #[must_use]
    pub fn from_upstream(error: UpstreamError) -> Self {
        match error {
            UpstreamError::ClientError {
                status,
                body,
                ..
            } => Self::UpstreamClient {
                status,
                body,
            },
            UpstreamError::ServerError {
                status, ..
            } => Self::UpstreamServer {
                status,
            },
            UpstreamError::RateLimited {
                retry_after,
            } => Self::RateLimited {
                retry_after,
            },
            UpstreamError::Transport {
                cause,
            } => Self::Transport {
                cause,
            },
            UpstreamError::Timeout => Self::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bloxgate_upstream::ServiceKind;

    use super::CallError;

    #[test]
    fn retryability_matches_the_contract() {
        assert!(CallError::Timeout.retryable());
        assert!(
            CallError::UpstreamServer {
                status: 502
            }
            .retryable()
        );
        assert!(
            !CallError::UpstreamClient {
                status: 404,
                body: serde_json::json!({}),
            }
            .retryable()
        );
        assert!(!CallError::Cancelled.retryable());
    }

    #[test]
    fn circuit_open_advertises_reset_delay() {
        let err = CallError::CircuitOpen {
            service: ServiceKind::InfobloxApi,
            retry_in: Duration::from_secs(42),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(err.kind_label(), "circuit_open");
    }
}
