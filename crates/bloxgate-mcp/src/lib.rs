// crates/bloxgate-mcp/src/lib.rs
// ============================================================================
// Module: RPC Transport
// Description: Frame protocol, sessions, and the streamable HTTP listener.
// Purpose: Carry agent-RPC traffic between clients and the tool registry.
// Dependencies: axum, tokio, bloxgate-registry
// ============================================================================

//! ## Overview
//! Clients speak a JSON frame protocol over streamable HTTP at `/mcp`, with
//! a deprecated `/sse` shim carrying the same frames over an event stream.
//! Sessions are created by `initialize` and enforce the
//! `NEW → READY → CLOSED` machine; each `call_tool` runs as its own task
//! whose frames flow through a bounded per-call channel, so one call's
//! frames are contiguous and a slow client backpressures only itself.

#![forbid(unsafe_code)]

mod protocol;
mod server;
mod session;

pub use protocol::Frame;
pub use protocol::PROTOCOL_VERSIONS;
pub use protocol::negotiate_version;
pub use server::McpServerState;
pub use server::Reply;
pub use server::handle_frame;
pub use server::router;
pub use server::spawn_idle_sweeper;
pub use session::SessionHandle;
pub use session::SessionState;
pub use session::SessionTable;
