// crates/bloxgate-mcp/src/server.rs
// ============================================================================
// Module: Transport Server
// Description: Frame dispatch and the axum listeners for /mcp and /sse.
// Purpose: Drive the session state machine and run calls as tasks.
// Dependencies: axum, tokio, bloxgate-registry, bloxgate-observe
// ============================================================================

//! ## Overview
//! `handle_frame` is the transport-independent dispatch: both HTTP paths
//! parse a frame, run it through the same state machine, and differ only in
//! response framing. `call_tool` spawns a task per call; its frames flow
//! through a bounded channel that becomes the response stream, and the
//! session's cancellation token aborts the call when the client goes away.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::routing::post;
use bloxgate_observe::MetricsCollector;
use bloxgate_observe::Span;
use bloxgate_observe::SpanSink;
use bloxgate_observe::SpanStatus;
use bloxgate_observe::names;
use bloxgate_registry::ToolContext;
use bloxgate_registry::ToolError;
use bloxgate_registry::ToolRegistry;
use bloxgate_resilience::CallPipeline;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::protocol::Frame;
use crate::protocol::negotiate_version;
use crate::session::SessionHandle;
use crate::session::SessionState;
use crate::session::SessionTable;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Interval between idle-session sweeps.
const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared state behind both transport paths.
pub struct McpServerState {
    /// The immutable tool registry.
    pub registry: Arc<ToolRegistry>,
    /// The resilience pipeline handed to tool contexts.
    pub pipeline: Arc<CallPipeline>,
    /// Live session table.
    pub sessions: Arc<SessionTable>,
    /// Metric registers.
    pub metrics: Arc<MetricsCollector>,
    /// Span destination for call spans.
    pub spans: Arc<dyn SpanSink>,
    /// Bounded depth of each call's outbound frame channel.
    pub queue_depth: usize,
}

/// Transport-independent dispatch result.
pub enum Reply {
    /// Single response frame.
    Frame(Frame),
    /// Stream of frames ending in exactly one terminal frame.
    Stream(mpsc::Receiver<Frame>),
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frame(frame) => f.debug_tuple("Frame").field(frame).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Builds the RPC router serving `/mcp` and the deprecated `/sse` shim.
pub fn router(state: Arc<McpServerState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/sse", post(handle_sse))
        .with_state(state)
}

/// Spawns the periodic idle-session sweeper.
pub fn spawn_idle_sweeper(state: Arc<McpServerState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            state.sessions.sweep();
        }
    })
}

// ============================================================================
// SECTION: Frame Dispatch
// ============================================================================

/// Runs one frame through the session state machine.
pub async fn handle_frame(state: &Arc<McpServerState>, frame: Frame) -> Reply {
    match frame {
        Frame::Initialize {
            id,
            protocol_version,
            session,
        } => handle_initialize(state, id, &protocol_version, session),
        Frame::ListTools {
            id,
            session,
        } => match resolve_session(state, &id, &session) {
            Err(error) => Reply::Frame(error),
            Ok(_) => handle_list_tools(state, id, session),
        },
        Frame::CallTool {
            id,
            session,
            name,
            arguments,
        } => match resolve_session(state, &id, &session) {
            Err(error) => Reply::Frame(error),
            Ok(handle) => handle_call_tool(state, handle, id, name, arguments),
        },
        Frame::Ping {
            id,
            session,
        } => match resolve_session(state, &id, &session) {
            Err(error) => Reply::Frame(error),
            Ok(_) => Reply::Frame(Frame::Ping {
                id,
                session,
            }),
        },
        Frame::Close {
            id,
            session,
        } => match resolve_session(state, &id, &session) {
            Err(error) => Reply::Frame(error),
            Ok(_) => {
                state.sessions.close(&session);
                Reply::Frame(Frame::Close {
                    id,
                    session,
                })
            }
        },
        // Server-emitted frame types arriving from a client are protocol
        // violations.
        other => Reply::Frame(protocol_error(
            other.id().to_string(),
            other.session().map(str::to_string),
            "unexpected frame type",
        )),
    }
}

/// Creates a session and acknowledges the negotiated version.
fn handle_initialize(
    state: &Arc<McpServerState>,
    id: String,
    protocol_version: &str,
    session: Option<String>,
) -> Reply {
    if let Some(session) = session {
        // Re-initializing an open session is rejected by the state machine.
        let message = if state.sessions.get(&session).is_some() {
            "session already initialized"
        } else {
            "unknown session"
        };
        return Reply::Frame(protocol_error(id, Some(session), message));
    }
    let negotiated = negotiate_version(protocol_version);
    let handle = state.sessions.create(negotiated);
    Reply::Frame(Frame::Initialized {
        id,
        session: handle.id.clone(),
        protocol_version: negotiated.to_string(),
    })
}

/// Returns the catalog derived from the registry.
fn handle_list_tools(state: &Arc<McpServerState>, id: String, session: String) -> Reply {
    let tools = state
        .registry
        .list_tools()
        .into_iter()
        .filter_map(|listing| serde_json::to_value(listing).ok())
        .collect();
    state
        .metrics
        .inc_counter(names::RPC_REQUESTS_TOTAL, &[("tool", "list_tools"), ("status", "ok")]);
    Reply::Frame(Frame::ListToolsResult {
        id,
        session,
        tools,
    })
}

/// Spawns the call task and returns its frame stream.
fn handle_call_tool(
    state: &Arc<McpServerState>,
    session: Arc<SessionHandle>,
    id: String,
    name: String,
    arguments: Value,
) -> Reply {
    let (frame_tx, frame_rx) = mpsc::channel::<Frame>(state.queue_depth);
    let (progress_tx, progress_rx) = mpsc::channel::<String>(state.queue_depth);

    let correlation_id = session.next_correlation_id();
    let mut span = Span::root(Arc::clone(&state.spans), "call_tool");
    span.set_attribute("tool", name.as_str());
    span.set_attribute("session", session.id.as_str());
    span.set_attribute("correlation_id", correlation_id.as_str());

    let ctx = ToolContext {
        pipeline: Arc::clone(&state.pipeline),
        correlation_id: correlation_id.clone(),
        span_parent: span.context(),
        progress: Some(progress_tx),
    };
    let state = Arc::clone(state);
    tokio::spawn(async move {
        run_call(&state, &session, span, ctx, progress_rx, frame_tx, id, name, arguments).await;
    });
    Reply::Stream(frame_rx)
}

/// Executes one call: forwards progress, awaits the result, emits exactly
/// one terminal frame, and honors session cancellation.
#[allow(clippy::too_many_arguments, reason = "Call plumbing stays explicit.")]
async fn run_call(
    state: &Arc<McpServerState>,
    session: &Arc<SessionHandle>,
    span: Span,
    ctx: ToolContext,
    mut progress_rx: mpsc::Receiver<String>,
    frame_tx: mpsc::Sender<Frame>,
    id: String,
    name: String,
    arguments: Value,
) {
    let started = tokio::time::Instant::now();
    let invoke = state.registry.invoke(&name, &arguments, &ctx);
    tokio::pin!(invoke);

    let mut progress_open = true;
    let outcome = loop {
        tokio::select! {
            () = session.cancel.cancelled() => break None,
            message = progress_rx.recv(), if progress_open => {
                match message {
                    Some(message) => {
                        let _ = frame_tx
                            .send(Frame::Progress {
                                id: id.clone(),
                                session: session.id.clone(),
                                message,
                            })
                            .await;
                    }
                    None => progress_open = false,
                }
            }
            result = &mut invoke => break Some(result),
        }
    };

    // Any progress emitted just before completion still precedes the
    // terminal frame.
    while let Ok(message) = progress_rx.try_recv() {
        let _ = frame_tx
            .send(Frame::Progress {
                id: id.clone(),
                session: session.id.clone(),
                message,
            })
            .await;
    }

    let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
    state
        .metrics
        .observe_duration_ms(names::RPC_REQUEST_DURATION_MS, &[("tool", name.as_str())], elapsed_ms);

    match outcome {
        None => {
            state.metrics.inc_counter(
                names::RPC_REQUESTS_TOTAL,
                &[("tool", name.as_str()), ("status", "cancelled")],
            );
            // The client is usually gone; delivery is best effort.
            let _ = frame_tx
                .send(Frame::Error {
                    id,
                    session: Some(session.id.clone()),
                    kind: "cancelled".to_string(),
                    message: "call cancelled by session close".to_string(),
                    retryable: false,
                    retry_after_ms: None,
                    correlation_id: Some(ctx.correlation_id.clone()),
                })
                .await;
            // Dropping the span records it as cancelled.
            drop(span);
        }
        Some(Ok(result)) => {
            state
                .metrics
                .inc_counter(names::RPC_REQUESTS_TOTAL, &[("tool", name.as_str()), ("status", "ok")]);
            state.metrics.record_outcome(true);
            span.finish(SpanStatus::Ok);
            let _ = frame_tx
                .send(Frame::CallToolResult {
                    id,
                    session: session.id.clone(),
                    result,
                })
                .await;
        }
        Some(Err(error)) => {
            state.metrics.inc_counter(
                names::RPC_REQUESTS_TOTAL,
                &[("tool", name.as_str()), ("status", "error")],
            );
            state.metrics.inc_counter(
                names::RPC_ERRORS_TOTAL,
                &[("tool", name.as_str()), ("error_kind", error.kind_label())],
            );
            state.metrics.record_outcome(false);
            let mut span = span;
            span.set_attribute("error_kind", error.kind_label());
            span.finish(SpanStatus::Error);
            let _ = frame_tx
                .send(error_frame(id, Some(session.id.clone()), &error, &ctx.correlation_id))
                .await;
        }
    }
}

/// Resolves and touches a session, enforcing the state machine.
fn resolve_session(
    state: &Arc<McpServerState>,
    id: &str,
    session_id: &str,
) -> Result<Arc<SessionHandle>, Frame> {
    let Some(handle) = state.sessions.get(session_id) else {
        return Err(protocol_error(
            id.to_string(),
            Some(session_id.to_string()),
            "session not initialized",
        ));
    };
    if handle.state() == SessionState::Closed {
        return Err(Frame::Error {
            id: id.to_string(),
            session: Some(session_id.to_string()),
            kind: "session_closed".to_string(),
            message: "session is closed".to_string(),
            retryable: false,
            retry_after_ms: None,
            correlation_id: None,
        });
    }
    handle.touch();
    Ok(handle)
}

/// Builds a protocol error frame.
fn protocol_error(id: String, session: Option<String>, message: &str) -> Frame {
    Frame::Error {
        id,
        session,
        kind: "protocol_error".to_string(),
        message: message.to_string(),
        retryable: false,
        retry_after_ms: None,
        correlation_id: None,
    }
}

/// Serializes a tool failure into an error frame.
fn error_frame(id: String, session: Option<String>, error: &ToolError, correlation_id: &str) -> Frame {
    Frame::Error {
        id,
        session,
        kind: error.kind_label().to_string(),
        message: error.to_string(),
        retryable: error.retryable(),
        retry_after_ms: error
            .retry_after()
            .map(|delay| u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)),
        correlation_id: Some(correlation_id.to_string()),
    }
}

// ============================================================================
// SECTION: HTTP Handlers
// ============================================================================

/// Streamable HTTP endpoint: JSON responses, SSE for call streams.
async fn handle_mcp(State(state): State<Arc<McpServerState>>, bytes: Bytes) -> Response {
    match parse_frame(&bytes) {
        Err(error) => (StatusCode::BAD_REQUEST, axum::Json(error)).into_response(),
        Ok(frame) => match handle_frame(&state, frame).await {
            Reply::Frame(frame) => {
                let status = frame_status(&frame);
                (status, axum::Json(frame)).into_response()
            }
            Reply::Stream(rx) => sse_response(rx),
        },
    }
}

/// Deprecated endpoint: identical dispatch, everything framed as SSE.
async fn handle_sse(State(state): State<Arc<McpServerState>>, bytes: Bytes) -> Response {
    match parse_frame(&bytes) {
        Err(error) => single_frame_sse(error),
        Ok(frame) => match handle_frame(&state, frame).await {
            Reply::Frame(frame) => single_frame_sse(frame),
            Reply::Stream(rx) => sse_response(rx),
        },
    }
}

/// Parses a frame, producing a protocol error frame on failure.
fn parse_frame(bytes: &Bytes) -> Result<Frame, Frame> {
    serde_json::from_slice(bytes).map_err(|_| {
        protocol_error("unknown".to_string(), None, "invalid frame")
    })
}

/// Maps protocol rejections to HTTP 4xx, everything else to 200.
fn frame_status(frame: &Frame) -> StatusCode {
    match frame {
        Frame::Error {
            kind, ..
        } if kind == "protocol_error" || kind == "session_closed" => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

/// Builds an SSE response from a call's frame stream.
fn sse_response(rx: mpsc::Receiver<Frame>) -> Response {
    let stream = ReceiverStream::new(rx).map(frame_event);
    Sse::new(stream).into_response()
}

/// Wraps one frame into a single-event SSE response.
fn single_frame_sse(frame: Frame) -> Response {
    let (tx, rx) = mpsc::channel::<Frame>(1);
    // The channel is sized for exactly this frame.
    let _ = tx.try_send(frame);
    drop(tx);
    sse_response(rx)
}

/// Serializes one frame into an SSE event.
fn frame_event(frame: Frame) -> Result<Event, Infallible> {
    let payload = serde_json::to_string(&frame).unwrap_or_else(|_| {
        "{\"type\":\"error\",\"id\":\"unknown\",\"kind\":\"serialization\",\
         \"message\":\"frame serialization failed\",\"retryable\":false}"
            .to_string()
    });
    Ok(Event::default().data(payload))
}
