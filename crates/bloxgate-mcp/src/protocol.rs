// crates/bloxgate-mcp/src/protocol.rs
// ============================================================================
// Module: Frame Protocol
// Description: JSON frame shapes and protocol version negotiation.
// Purpose: One stable wire vocabulary for both transports.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every frame is a JSON object with a `type` tag, an `id` correlation
//! token, and the session id on all post-initialize frames. The same enum
//! serves the streamable `/mcp` path and the legacy `/sse` shim; only the
//! HTTP framing differs.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Protocol versions the gateway can speak, newest first.
pub const PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// Negotiates the session protocol version.
///
/// A version the gateway knows is accepted as-is; anything else negotiates
/// down to the newest supported version.
#[must_use]
pub fn negotiate_version(requested: &str) -> &'static str {
    PROTOCOL_VERSIONS
        .iter()
        .find(|version| **version == requested)
        .copied()
        .unwrap_or(PROTOCOL_VERSIONS[0])
}

/// One protocol frame.
///
/// # Invariants
/// - `id` correlates a request frame with its response frames.
/// - Every post-initialize frame carries the session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Client opens a session and announces its protocol version.
    Initialize {
        /// Correlation id.
        id: String,
        /// Version the client wants to speak.
        protocol_version: String,
        /// Present only when a client re-initializes an open session,
        /// which the state machine rejects.
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<String>,
    },
    /// Server acknowledges a new session.
    Initialized {
        /// Correlation id echoed from the initialize frame.
        id: String,
        /// Opaque session id, echoed on every later frame.
        session: String,
        /// Negotiated protocol version.
        protocol_version: String,
    },
    /// Client requests the tool catalog.
    ListTools {
        /// Correlation id.
        id: String,
        /// Session id.
        session: String,
    },
    /// Server returns the tool catalog.
    ListToolsResult {
        /// Correlation id echoed from the request.
        id: String,
        /// Session id.
        session: String,
        /// Tool listings with name, description, and input schema.
        tools: Vec<Value>,
    },
    /// Client invokes one tool.
    CallTool {
        /// Correlation id.
        id: String,
        /// Session id.
        session: String,
        /// Tool name.
        name: String,
        /// Tool arguments.
        arguments: Value,
    },
    /// Terminal success frame for one call.
    CallToolResult {
        /// Correlation id echoed from the call.
        id: String,
        /// Session id.
        session: String,
        /// Tool result payload.
        result: Value,
    },
    /// Intermediate progress notification for one call.
    Progress {
        /// Correlation id echoed from the call.
        id: String,
        /// Session id.
        session: String,
        /// Human-readable progress message.
        message: String,
    },
    /// Advisory keepalive; echoed back unchanged.
    Ping {
        /// Correlation id.
        id: String,
        /// Session id.
        session: String,
    },
    /// Terminal failure frame for one call or a protocol rejection.
    Error {
        /// Correlation id echoed from the offending frame.
        id: String,
        /// Session id when one was resolvable.
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<String>,
        /// Stable error kind label.
        kind: String,
        /// Human-readable message without internal detail.
        message: String,
        /// Whether the client may retry.
        retryable: bool,
        /// Suggested retry delay in milliseconds.
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
        /// Correlation id of the failed call, for log correlation.
        #[serde(skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
    },
    /// Either side ends the session.
    Close {
        /// Correlation id.
        id: String,
        /// Session id.
        session: String,
    },
}

impl Frame {
    /// Returns the session id carried by the frame, when any.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        match self {
            Self::Initialize {
                session, ..
            } => session.as_deref(),
            Self::Initialized {
                session, ..
            }
            | Self::ListTools {
                session, ..
            }
            | Self::ListToolsResult {
                session, ..
            }
            | Self::CallTool {
                session, ..
            }
            | Self::CallToolResult {
                session, ..
            }
            | Self::Progress {
                session, ..
            }
            | Self::Ping {
                session, ..
            }
            | Self::Close {
                session, ..
            } => Some(session),
            Self::Error {
                session, ..
            } => session.as_deref(),
        }
    }

    /// Returns the frame's correlation id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Initialize {
                id, ..
            }
            | Self::Initialized {
                id, ..
            }
            | Self::ListTools {
                id, ..
            }
            | Self::ListToolsResult {
                id, ..
            }
            | Self::CallTool {
                id, ..
            }
            | Self::CallToolResult {
                id, ..
            }
            | Self::Progress {
                id, ..
            }
            | Self::Ping {
                id, ..
            }
            | Self::Error {
                id, ..
            }
            | Self::Close {
                id, ..
            } => id,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;

    fn round_trip(frame: &Frame) {
        let encoded = serde_json::to_string(frame).unwrap();
        let decoded: Frame = serde_json::from_str(&encoded).unwrap();
        assert_eq!(&decoded, frame);
        // Value-level round trip catches field renames and omissions.
        let value: Value = serde_json::from_str(&encoded).unwrap();
        let reencoded = serde_json::to_value(&decoded).unwrap();
        assert_eq!(value, reencoded);
    }

    #[test]
    fn every_frame_shape_round_trips() {
        round_trip(&Frame::Initialize {
            id: "1".to_string(),
            protocol_version: "2025-03-26".to_string(),
            session: None,
        });
        round_trip(&Frame::Initialized {
            id: "1".to_string(),
            session: "sess-a".to_string(),
            protocol_version: "2025-03-26".to_string(),
        });
        round_trip(&Frame::ListTools {
            id: "2".to_string(),
            session: "sess-a".to_string(),
        });
        round_trip(&Frame::ListToolsResult {
            id: "2".to_string(),
            session: "sess-a".to_string(),
            tools: vec![json!({"name": "list_ip_spaces"})],
        });
        round_trip(&Frame::CallTool {
            id: "3".to_string(),
            session: "sess-a".to_string(),
            name: "list_ip_spaces".to_string(),
            arguments: json!({"limit": 10}),
        });
        round_trip(&Frame::CallToolResult {
            id: "3".to_string(),
            session: "sess-a".to_string(),
            result: json!({"results": []}),
        });
        round_trip(&Frame::Progress {
            id: "3".to_string(),
            session: "sess-a".to_string(),
            message: "working".to_string(),
        });
        round_trip(&Frame::Ping {
            id: "4".to_string(),
            session: "sess-a".to_string(),
        });
        round_trip(&Frame::Error {
            id: "5".to_string(),
            session: Some("sess-a".to_string()),
            kind: "rate_limited".to_string(),
            message: "upstream rate limited".to_string(),
            retryable: true,
            retry_after_ms: Some(2_000),
            correlation_id: Some("sess-a-3".to_string()),
        });
        round_trip(&Frame::Close {
            id: "6".to_string(),
            session: "sess-a".to_string(),
        });
    }

    #[test]
    fn wire_type_tags_are_snake_case() {
        let frame = Frame::ListTools {
            id: "1".to_string(),
            session: "s".to_string(),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], json!("list_tools"));
    }

    #[test]
    fn negotiation_accepts_known_and_downgrades_unknown() {
        assert_eq!(negotiate_version("2024-11-05"), "2024-11-05");
        assert_eq!(negotiate_version("2025-03-26"), "2025-03-26");
        assert_eq!(negotiate_version("1999-01-01"), "2025-03-26");
    }
}
