// crates/bloxgate-registry/src/error.rs
// ============================================================================
// Module: Registry Errors
// Description: Tool-level failure taxonomy.
// Purpose: Separate caller bugs from upstream failures for the transport.
// Dependencies: bloxgate-resilience, thiserror
// ============================================================================

//! ## Overview
//! `ToolError` is what a handler returns: schema violations and unknown
//! tools are caller bugs and never reach the upstream; `NotFound` is the
//! semantic translation of an upstream 404 on get-by-id tools; everything
//! else is a pipeline failure passed through untouched.

use std::time::Duration;

use bloxgate_resilience::CallError;
use thiserror::Error;

/// Failures surfaced by `invoke`.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not registered.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// Requested tool name.
        name: String,
    },
    /// Arguments failed schema validation.
    #[error("invalid arguments: {message}")]
    SchemaViolation {
        /// What was rejected and why.
        message: String,
    },
    /// The addressed resource does not exist upstream.
    #[error("not found: {message}")]
    NotFound {
        /// Which resource was missing.
        message: String,
    },
    /// Pipeline or upstream failure.
    #[error(transparent)]
    Call(#[from] CallError),
}

impl ToolError {
    /// Returns the stable kind label serialized into error frames.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::UnknownTool {
                ..
            } => "unknown_tool",
            Self::SchemaViolation {
                ..
            } => "schema_violation",
            Self::NotFound {
                ..
            } => "not_found",
            Self::Call(err) => err.kind_label(),
        }
    }

    /// Returns whether the RPC client may retry the call.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        match self {
            Self::UnknownTool {
                ..
            }
            | Self::SchemaViolation {
                ..
            }
            | Self::NotFound {
                ..
            } => false,
            Self::Call(err) => err.retryable(),
        }
    }

    /// Returns the retry delay to advertise, when one applies.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Call(err) => err.retry_after(),
            _ => None,
        }
    }
}

/// Failures while assembling the registry at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two descriptors claimed the same name.
    #[error("duplicate tool registration: {name}")]
    DuplicateTool {
        /// The contested tool name.
        name: &'static str,
    },
}
