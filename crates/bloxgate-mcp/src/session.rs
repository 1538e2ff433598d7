// crates/bloxgate-mcp/src/session.rs
// ============================================================================
// Module: Sessions
// Description: Session lifecycle, id generation, and the session table.
// Purpose: Track live frame streams and propagate cancellation into calls.
// Dependencies: rand, tokio, tokio-util
// ============================================================================

//! ## Overview
//! A session is born `READY` by `initialize` and moves to `CLOSED` on a
//! close frame, client disconnect, or idle timeout. Session ids combine a
//! boot-scoped random component with a monotonic counter, so they are
//! unique for the process lifetime without coordination. Each session owns
//! a cancellation token; closing the session cancels every in-flight call
//! spawned under it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bloxgate_observe::MetricsCollector;
use bloxgate_observe::names;
use rand::RngCore;
use rand::rngs::OsRng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Session State
// ============================================================================

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initialized and accepting frames.
    Ready,
    /// Closed; every frame is rejected.
    Closed,
}

/// One live session.
///
/// # Invariants
/// - `id` is unique for the process lifetime.
/// - Cancelling `cancel` reaches every in-flight call of the session.
pub struct SessionHandle {
    /// Opaque session id.
    pub id: String,
    /// Negotiated protocol version.
    pub protocol_version: &'static str,
    /// Lifecycle state.
    state: Mutex<SessionState>,
    /// Cancellation root for the session's calls.
    pub cancel: CancellationToken,
    /// Last frame arrival, for idle sweeping.
    last_seen: Mutex<Instant>,
    /// Per-session call counter for correlation ids.
    call_seq: AtomicU64,
}

impl SessionHandle {
    fn new(id: String, protocol_version: &'static str) -> Self {
        Self {
            id,
            protocol_version,
            state: Mutex::new(SessionState::Ready),
            cancel: CancellationToken::new(),
            last_seen: Mutex::new(Instant::now()),
            call_seq: AtomicU64::new(0),
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.lock().map_or(SessionState::Closed, |state| *state)
    }

    /// Marks frame activity for idle accounting.
    pub fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    /// Returns how long the session has been idle.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .map_or(Duration::ZERO, |last_seen| last_seen.elapsed())
    }

    /// Issues the next per-call correlation id.
    #[must_use]
    pub fn next_correlation_id(&self) -> String {
        let seq = self.call_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{seq}", self.id)
    }

    /// Closes the session and cancels its in-flight calls.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = SessionState::Closed;
        }
        self.cancel.cancel();
    }
}

// ============================================================================
// SECTION: Id Generation
// ============================================================================

/// Boot-scoped session id generator.
///
/// # Invariants
/// - Issued ids are unique within the process lifetime.
struct SessionIdGenerator {
    /// Random component drawn once per process.
    boot_id: u64,
    /// Monotonic counter.
    counter: AtomicU64,
}

impl SessionIdGenerator {
    fn new() -> Self {
        Self {
            boot_id: OsRng.next_u64(),
            counter: AtomicU64::new(0),
        }
    }

    fn issue(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("sess-{:016x}-{seq:06}", self.boot_id)
    }
}

// ============================================================================
// SECTION: Session Table
// ============================================================================

/// All live sessions behind one lock.
///
/// # Invariants
/// - The lock is never held across a suspension point.
/// - The `active_sessions` gauge tracks the ready-session count.
pub struct SessionTable {
    /// Sessions keyed by id; closed sessions linger until swept.
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
    /// Session id generator.
    generator: SessionIdGenerator,
    /// Idle timeout before the sweeper closes a session.
    idle_timeout: Duration,
    /// Metric registers for the session gauge.
    metrics: Arc<MetricsCollector>,
}

impl SessionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(idle_timeout: Duration, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            generator: SessionIdGenerator::new(),
            idle_timeout,
            metrics,
        }
    }

    /// Creates a session for a freshly initialized client.
    #[must_use]
    pub fn create(&self, protocol_version: &'static str) -> Arc<SessionHandle> {
        let id = self.generator.issue();
        let handle = Arc::new(SessionHandle::new(id.clone(), protocol_version));
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(id, Arc::clone(&handle));
        }
        self.publish_gauge();
        tracing::info!(
            event = "client_initialized",
            session = %handle.id,
            protocol_version = handle.protocol_version,
        );
        handle
    }

    /// Looks up a session by id, whatever its state.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().ok().and_then(|sessions| sessions.get(id).cloned())
    }

    /// Closes one session; returns whether it existed and was ready.
    pub fn close(&self, id: &str) -> bool {
        let handle = self.get(id);
        let closed = handle.map_or(false, |handle| {
            let was_ready = handle.state() == SessionState::Ready;
            handle.close();
            was_ready
        });
        self.publish_gauge();
        closed
    }

    /// Closes every session; used at shutdown.
    pub fn close_all(&self) {
        if let Ok(sessions) = self.sessions.lock() {
            for handle in sessions.values() {
                handle.close();
            }
        }
        self.publish_gauge();
    }

    /// Closes idle sessions and drops closed entries.
    pub fn sweep(&self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            for handle in sessions.values() {
                if handle.state() == SessionState::Ready && handle.idle_for() > self.idle_timeout {
                    tracing::info!(event = "session_idle_timeout", session = %handle.id);
                    handle.close();
                }
            }
            sessions.retain(|_, handle| handle.state() == SessionState::Ready);
        }
        self.publish_gauge();
    }

    /// Returns the number of ready sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.lock().map_or(0, |sessions| {
            sessions.values().filter(|handle| handle.state() == SessionState::Ready).count()
        })
    }

    fn publish_gauge(&self) {
        self.metrics.set_gauge(names::ACTIVE_SESSIONS, &[], self.active_count() as f64);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    fn table(idle: Duration) -> SessionTable {
        SessionTable::new(idle, Arc::new(MetricsCollector::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_unique_and_sessions_start_ready() {
        let table = table(Duration::from_secs(300));
        let a = table.create("2025-03-26");
        let b = table.create("2025-03-26");
        assert_ne!(a.id, b.id);
        assert_eq!(a.state(), SessionState::Ready);
        assert_eq!(table.active_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_and_rejects() {
        let table = table(Duration::from_secs(300));
        let handle = table.create("2025-03-26");
        assert!(table.close(&handle.id));
        assert_eq!(handle.state(), SessionState::Closed);
        assert!(handle.cancel.is_cancelled());
        // Closing twice reports the session was no longer ready.
        assert!(!table.close(&handle.id));
        assert_eq!(table.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_swept() {
        let table = table(Duration::from_secs(300));
        let stale = table.create("2025-03-26");
        tokio::time::advance(Duration::from_secs(301)).await;
        let fresh = table.create("2025-03-26");
        table.sweep();
        assert_eq!(stale.state(), SessionState::Closed);
        assert!(table.get(&stale.id).is_none());
        assert_eq!(fresh.state(), SessionState::Ready);
        assert_eq!(table.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn correlation_ids_are_session_scoped() {
        let table = table(Duration::from_secs(300));
        let handle = table.create("2025-03-26");
        let first = handle.next_correlation_id();
        let second = handle.next_correlation_id();
        assert_ne!(first, second);
        assert!(first.starts_with(&handle.id));
    }
}
