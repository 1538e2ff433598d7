// crates/bloxgate-mcp/tests/transport.rs
// ============================================================================
// Module: Transport Behavior Tests
// Description: Session state machine and call framing end to end.
// Purpose: Pin the one-terminal-frame invariant and cancellation behavior.
// Dependencies: tokio, async-trait
// ============================================================================

#![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use bloxgate_mcp::Frame;
use bloxgate_mcp::McpServerState;
use bloxgate_mcp::Reply;
use bloxgate_mcp::SessionState;
use bloxgate_mcp::SessionTable;
use bloxgate_mcp::handle_frame;
use bloxgate_observe::MetricsCollector;
use bloxgate_observe::NoopSpanSink;
use bloxgate_observe::names;
use bloxgate_registry::RegistryDefaults;
use bloxgate_registry::ToolRegistry;
use bloxgate_resilience::BreakerConfig;
use bloxgate_resilience::BreakerState;
use bloxgate_resilience::CacheSettings;
use bloxgate_resilience::CallPipeline;
use bloxgate_resilience::CircuitBreakers;
use bloxgate_resilience::RetryPolicy;
use bloxgate_resilience::ToolCache;
use bloxgate_upstream::ServiceKind;
use bloxgate_upstream::UpstreamError;
use bloxgate_upstream::UpstreamRequest;
use bloxgate_upstream::UpstreamResponse;
use bloxgate_upstream::UpstreamTransport;
use serde_json::json;

// ----------------------------------------------------------------------------
// Fakes and fixture
// ----------------------------------------------------------------------------

/// Transport modes for the fake upstream.
enum Mode {
    /// Always succeed with a fixed body.
    Ok,
    /// Park forever until the call is cancelled.
    Hang,
}

struct FakeTransport {
    mode: Mode,
    calls: AtomicUsize,
    park: tokio::sync::Notify,
}

impl FakeTransport {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            park: tokio::sync::Notify::new(),
        })
    }
}

#[async_trait]
impl UpstreamTransport for FakeTransport {
    async fn send(&self, _request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Ok => Ok(UpstreamResponse {
                status: 200,
                retry_after: None,
                body: json!({"results": [{"id": "space-1"}]}),
            }),
            Mode::Hang => {
                self.park.notified().await;
                Err(UpstreamError::Timeout)
            }
        }
    }
}

fn state_with(mode: Mode) -> (Arc<McpServerState>, Arc<FakeTransport>, Arc<CircuitBreakers>) {
    let transport = FakeTransport::new(mode);
    let metrics = Arc::new(MetricsCollector::new());
    let breakers = Arc::new(CircuitBreakers::new(BreakerConfig {
        failure_threshold: 5,
        reset_timeout: Duration::from_secs(60),
    }));
    let pipeline = Arc::new(CallPipeline::new(
        transport.clone(),
        breakers.clone(),
        Arc::new(ToolCache::new(CacheSettings {
            enabled: true,
            default_ttl: Duration::from_secs(300),
            max_entries_per_tool: 1_000,
        })),
        RetryPolicy::new(12),
        Duration::from_secs(30),
        metrics.clone(),
        Arc::new(NoopSpanSink),
    ));
    let registry = Arc::new(
        ToolRegistry::with_catalog(RegistryDefaults {
            default_cache_ttl: Duration::from_secs(300),
        })
        .unwrap(),
    );
    let sessions = Arc::new(SessionTable::new(Duration::from_secs(300), metrics.clone()));
    let state = Arc::new(McpServerState {
        registry,
        pipeline,
        sessions,
        metrics,
        spans: Arc::new(NoopSpanSink),
        queue_depth: 64,
    });
    (state, transport, breakers)
}

/// Initializes a session and returns its id.
async fn initialize(state: &Arc<McpServerState>) -> String {
    let reply = handle_frame(
        state,
        Frame::Initialize {
            id: "init-1".to_string(),
            protocol_version: "2025-03-26".to_string(),
            session: None,
        },
    )
    .await;
    match reply {
        Reply::Frame(Frame::Initialized {
            session, ..
        }) => session,
        other => panic!("expected initialized frame, got {other:?}"),
    }
}

/// Drains a call stream into a vector.
async fn collect(reply: Reply) -> Vec<Frame> {
    match reply {
        Reply::Frame(frame) => vec![frame],
        Reply::Stream(mut rx) => {
            let mut frames = Vec::new();
            while let Some(frame) = rx.recv().await {
                frames.push(frame);
            }
            frames
        }
    }
}

// ----------------------------------------------------------------------------
// Session state machine
// ----------------------------------------------------------------------------

#[tokio::test]
async fn initialize_negotiates_and_issues_unique_sessions() {
    let (state, _, _) = state_with(Mode::Ok);
    let a = initialize(&state).await;
    let b = initialize(&state).await;
    assert_ne!(a, b);
    assert_eq!(state.sessions.active_count(), 2);

    // Unknown client versions negotiate down to the newest supported one.
    let reply = handle_frame(
        &state,
        Frame::Initialize {
            id: "init-x".to_string(),
            protocol_version: "1999-01-01".to_string(),
            session: None,
        },
    )
    .await;
    match reply {
        Reply::Frame(Frame::Initialized {
            protocol_version, ..
        }) => assert_eq!(protocol_version, "2025-03-26"),
        other => panic!("expected initialized frame, got {other:?}"),
    }
}

#[tokio::test]
async fn frames_before_initialize_are_rejected() {
    let (state, transport, _) = state_with(Mode::Ok);
    let reply = handle_frame(
        &state,
        Frame::CallTool {
            id: "c1".to_string(),
            session: "sess-nope".to_string(),
            name: "list_ip_spaces".to_string(),
            arguments: json!({}),
        },
    )
    .await;
    match reply {
        Reply::Frame(Frame::Error {
            kind, ..
        }) => assert_eq!(kind, "protocol_error"),
        other => panic!("expected error frame, got {other:?}"),
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reinitializing_an_open_session_is_rejected() {
    let (state, _, _) = state_with(Mode::Ok);
    let session = initialize(&state).await;
    let reply = handle_frame(
        &state,
        Frame::Initialize {
            id: "init-2".to_string(),
            protocol_version: "2025-03-26".to_string(),
            session: Some(session),
        },
    )
    .await;
    match reply {
        Reply::Frame(Frame::Error {
            kind,
            message,
            ..
        }) => {
            assert_eq!(kind, "protocol_error");
            assert!(message.contains("already initialized"));
        }
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn closed_sessions_reject_everything() {
    let (state, _, _) = state_with(Mode::Ok);
    let session = initialize(&state).await;
    let reply = handle_frame(
        &state,
        Frame::Close {
            id: "x".to_string(),
            session: session.clone(),
        },
    )
    .await;
    assert!(matches!(reply, Reply::Frame(Frame::Close { .. })));

    let reply = handle_frame(
        &state,
        Frame::ListTools {
            id: "l1".to_string(),
            session,
        },
    )
    .await;
    match reply {
        Reply::Frame(Frame::Error {
            kind, ..
        }) => assert_eq!(kind, "session_closed"),
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn ping_is_echoed() {
    let (state, _, _) = state_with(Mode::Ok);
    let session = initialize(&state).await;
    let reply = handle_frame(
        &state,
        Frame::Ping {
            id: "p1".to_string(),
            session: session.clone(),
        },
    )
    .await;
    match reply {
        Reply::Frame(Frame::Ping {
            id,
            session: echoed,
        }) => {
            assert_eq!(id, "p1");
            assert_eq!(echoed, session);
        }
        other => panic!("expected ping echo, got {other:?}"),
    }
}

// ----------------------------------------------------------------------------
// Catalog round trip
// ----------------------------------------------------------------------------

#[tokio::test]
async fn list_tools_matches_the_registry_and_every_name_dispatches() {
    let (state, _, _) = state_with(Mode::Ok);
    let session = initialize(&state).await;
    let reply = handle_frame(
        &state,
        Frame::ListTools {
            id: "l1".to_string(),
            session: session.clone(),
        },
    )
    .await;
    let tools = match reply {
        Reply::Frame(Frame::ListToolsResult {
            tools, ..
        }) => tools,
        other => panic!("expected list result, got {other:?}"),
    };
    assert_eq!(tools.len(), state.registry.len());

    for tool in &tools {
        let name = tool["name"].as_str().unwrap();
        // Dispatch must resolve the name; invalid arguments may fail
        // validation but never as unknown_tool.
        let frames = collect(
            handle_frame(
                &state,
                Frame::CallTool {
                    id: format!("probe-{name}"),
                    session: session.clone(),
                    name: name.to_string(),
                    arguments: json!({"__probe__": true}),
                },
            )
            .await,
        )
        .await;
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Frame::Error {
                kind, ..
            } => assert_ne!(kind, "unknown_tool", "tool {name} did not dispatch"),
            Frame::CallToolResult {
                ..
            } => {}
            other => panic!("unexpected frame for {name}: {other:?}"),
        }
    }
}

// ----------------------------------------------------------------------------
// Call framing
// ----------------------------------------------------------------------------

#[tokio::test]
async fn successful_call_emits_exactly_one_terminal_frame() {
    let (state, transport, _) = state_with(Mode::Ok);
    let session = initialize(&state).await;
    let frames = collect(
        handle_frame(
            &state,
            Frame::CallTool {
                id: "c1".to_string(),
                session: session.clone(),
                name: "list_ip_spaces".to_string(),
                arguments: json!({"limit": 10}),
            },
        )
        .await,
    )
    .await;

    let terminal: Vec<&Frame> = frames
        .iter()
        .filter(|frame| {
            matches!(
                frame,
                Frame::CallToolResult {
                    ..
                } | Frame::Error {
                    ..
                }
            )
        })
        .collect();
    assert_eq!(terminal.len(), 1);
    match terminal[0] {
        Frame::CallToolResult {
            id,
            session: echoed,
            result,
        } => {
            assert_eq!(id, "c1");
            assert_eq!(echoed, &session);
            assert_eq!(result["results"][0]["id"], json!("space-1"));
        }
        other => panic!("expected result frame, got {other:?}"),
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.metrics.counter_total(names::RPC_REQUESTS_TOTAL), 1);
}

#[tokio::test]
async fn failed_call_emits_exactly_one_error_frame() {
    let (state, transport, _) = state_with(Mode::Ok);
    let session = initialize(&state).await;
    let frames = collect(
        handle_frame(
            &state,
            Frame::CallTool {
                id: "c2".to_string(),
                session,
                name: "create_a_record".to_string(),
                arguments: json!({"name": "x"}),
            },
        )
        .await,
    )
    .await;
    assert_eq!(frames.len(), 1);
    match &frames[0] {
        Frame::Error {
            kind,
            retryable,
            correlation_id,
            ..
        } => {
            assert_eq!(kind, "schema_violation");
            assert!(!retryable);
            assert!(correlation_id.is_some());
        }
        other => panic!("expected error frame, got {other:?}"),
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.metrics.counter_total(names::RPC_ERRORS_TOTAL), 1);
}

#[tokio::test]
async fn unknown_tool_surfaces_in_the_error_frame() {
    let (state, _, _) = state_with(Mode::Ok);
    let session = initialize(&state).await;
    let frames = collect(
        handle_frame(
            &state,
            Frame::CallTool {
                id: "c3".to_string(),
                session,
                name: "no_such_tool".to_string(),
                arguments: json!({}),
            },
        )
        .await,
    )
    .await;
    assert_eq!(frames.len(), 1);
    match &frames[0] {
        Frame::Error {
            kind, ..
        } => assert_eq!(kind, "unknown_tool"),
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn compound_call_streams_progress_before_the_terminal_frame() {
    let (state, _, _) = state_with(Mode::Ok);
    let session = initialize(&state).await;
    let frames = collect(
        handle_frame(
            &state,
            Frame::CallTool {
                id: "c4".to_string(),
                session,
                name: "configure_vpn_infrastructure".to_string(),
                arguments: json!({"vpn_payload": {
                    "universal_service": {"operation": "CREATE", "name": "Test-VPN"},
                }}),
            },
        )
        .await,
    )
    .await;
    assert!(frames.len() >= 2, "expected progress plus terminal, got {frames:?}");
    assert!(matches!(
        frames.first(),
        Some(Frame::Progress {
            ..
        })
    ));
    assert!(matches!(
        frames.last(),
        Some(Frame::CallToolResult {
            ..
        })
    ));
}

// ----------------------------------------------------------------------------
// Cancellation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn closing_the_session_cancels_in_flight_calls() {
    let (state, transport, breakers) = state_with(Mode::Hang);
    let session = initialize(&state).await;
    let reply = handle_frame(
        &state,
        Frame::CallTool {
            id: "c5".to_string(),
            session: session.clone(),
            name: "configure_vpn_infrastructure".to_string(),
            arguments: json!({"vpn_payload": {
                "universal_service": {"operation": "CREATE", "name": "Doomed-VPN"},
            }}),
        },
    )
    .await;
    let Reply::Stream(mut rx) = reply else {
        panic!("expected stream reply");
    };

    // Wait for the call to reach its upstream await, then close.
    loop {
        if transport.calls.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    handle_frame(
        &state,
        Frame::Close {
            id: "x".to_string(),
            session: session.clone(),
        },
    )
    .await;

    let mut saw_cancelled = false;
    while let Some(frame) = rx.recv().await {
        if let Frame::Error {
            kind, ..
        } = frame
        {
            if kind == "cancelled" {
                saw_cancelled = true;
            }
        }
    }
    assert!(saw_cancelled);
    assert_eq!(
        state.sessions.get(&session).map(|handle| handle.state()),
        Some(SessionState::Closed)
    );
    // A cancelled call mutates neither cache nor breaker counters.
    assert_eq!(state.pipeline.cache().entry_count(), 0);
    assert_eq!(breakers.state(ServiceKind::NiosxaasApi), BreakerState::Closed);
}
