// crates/bloxgate-resilience/src/breaker.rs
// ============================================================================
// Module: Circuit Breakers
// Description: Per-service breaker state machines.
// Purpose: Suppress calls to a failing upstream until it recovers.
// Dependencies: bloxgate-upstream, bloxgate-observe, tokio
// ============================================================================

//! ## Overview
//! One breaker per upstream service, all behind a single short-lived mutex.
//! The machine is `CLOSED → OPEN` after a run of counted failures,
//! `OPEN → HALF_OPEN` once the reset timeout elapses, and `HALF_OPEN`
//! admits exactly one probe: its success closes the breaker, its failure
//! reopens it. Time is `tokio::time::Instant` so tests drive transitions
//! with virtual time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use bloxgate_observe::BreakerHealthView;
use bloxgate_observe::BreakerStateLabel;
use bloxgate_upstream::ServiceKind;
use tokio::time::Instant;

// ============================================================================
// SECTION: State
// ============================================================================

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// One probe call is admitted.
    HalfOpen,
}

impl BreakerState {
    /// Returns the stable label used in logs and health payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Returns the gauge encoding: 0 closed, 0.5 half-open, 1 open.
    #[must_use]
    pub const fn gauge_value(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 0.5,
            Self::Open => 1.0,
        }
    }

    /// Converts to the health evaluator's label type.
    #[must_use]
    pub const fn health_label(self) -> BreakerStateLabel {
        match self {
            Self::Closed => BreakerStateLabel::Closed,
            Self::HalfOpen => BreakerStateLabel::HalfOpen,
            Self::Open => BreakerStateLabel::Open,
        }
    }
}

/// Admission decision for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed; proceed.
    Allow,
    /// Breaker half-open; this call is the recovery probe.
    Probe,
    /// Breaker open; fail fast.
    Rejected {
        /// Time until the next probe is admitted.
        retry_in: Duration,
    },
}

/// One breaker's bookkeeping.
#[derive(Debug)]
struct Breaker {
    /// Current state.
    state: BreakerState,
    /// Consecutive counted failures while closed.
    consecutive_failures: u32,
    /// Instant of the last state transition.
    last_change: Instant,
    /// Cumulative open transitions.
    open_count: u64,
    /// Whether the half-open probe slot is taken.
    probe_inflight: bool,
}

impl Breaker {
    fn new(now: Instant) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_change: now,
            open_count: 0,
            probe_inflight: false,
        }
    }

    fn transition(&mut self, to: BreakerState, now: Instant) {
        self.state = to;
        self.last_change = now;
        self.probe_inflight = false;
        if to == BreakerState::Open {
            self.open_count += 1;
        }
        if to == BreakerState::Closed {
            self.consecutive_failures = 0;
        }
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Breaker tuning shared by every service.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive counted failures that open the breaker.
    pub failure_threshold: u32,
    /// Time an open breaker waits before admitting a probe.
    pub reset_timeout: Duration,
}

/// Observed state transition, for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Affected service.
    pub service: ServiceKind,
    /// Previous state.
    pub from: BreakerState,
    /// New state.
    pub to: BreakerState,
}

/// Point-in-time breaker view for health and the state gauge.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    /// Service the breaker guards.
    pub service: ServiceKind,
    /// Current state.
    pub state: BreakerState,
    /// Seconds since the last transition.
    pub seconds_in_state: f64,
    /// Cumulative open transitions.
    pub open_count: u64,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// All per-service breakers behind one lock.
///
/// # Invariants
/// - The lock is never held across a suspension point.
/// - Only the pipeline mutates; observers read snapshots.
#[derive(Debug)]
pub struct CircuitBreakers {
    /// Shared tuning.
    config: BreakerConfig,
    /// Breaker per service.
    inner: Mutex<HashMap<ServiceKind, Breaker>>,
}

impl CircuitBreakers {
    /// Creates breakers for every upstream service, all closed.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        let now = Instant::now();
        let inner = ServiceKind::all()
            .into_iter()
            .map(|service| (service, Breaker::new(now)))
            .collect();
        Self {
            config,
            inner: Mutex::new(inner),
        }
    }

    /// Gates one call against the breaker for `service`.
    ///
    /// An open breaker whose reset timeout has elapsed moves to half-open
    /// and admits the caller as the probe; the transition is returned so
    /// the caller can record it.
    pub fn admit(&self, service: ServiceKind) -> (Admission, Option<Transition>) {
        let now = Instant::now();
        let Ok(mut inner) = self.inner.lock() else {
            return (Admission::Allow, None);
        };
        let breaker = inner.entry(service).or_insert_with(|| Breaker::new(now));
        match breaker.state {
            BreakerState::Closed => (Admission::Allow, None),
            BreakerState::Open => {
                let elapsed = now.duration_since(breaker.last_change);
                if elapsed < self.config.reset_timeout {
                    (
                        Admission::Rejected {
                            retry_in: self.config.reset_timeout - elapsed,
                        },
                        None,
                    )
                } else {
                    breaker.transition(BreakerState::HalfOpen, now);
                    breaker.probe_inflight = true;
                    (
                        Admission::Probe,
                        Some(Transition {
                            service,
                            from: BreakerState::Open,
                            to: BreakerState::HalfOpen,
                        }),
                    )
                }
            }
            BreakerState::HalfOpen => {
                if breaker.probe_inflight {
                    (
                        Admission::Rejected {
                            retry_in: self.config.reset_timeout,
                        },
                        None,
                    )
                } else {
                    breaker.probe_inflight = true;
                    (Admission::Probe, None)
                }
            }
        }
    }

    /// Records a successful call.
    pub fn record_success(&self, service: ServiceKind) -> Option<Transition> {
        let now = Instant::now();
        let mut inner = self.inner.lock().ok()?;
        let breaker = inner.get_mut(&service)?;
        breaker.consecutive_failures = 0;
        if breaker.state == BreakerState::HalfOpen {
            breaker.transition(BreakerState::Closed, now);
            return Some(Transition {
                service,
                from: BreakerState::HalfOpen,
                to: BreakerState::Closed,
            });
        }
        None
    }

    /// Records a counted failure.
    ///
    /// Excluded error classes must not reach this method; the pipeline
    /// filters them first.
    pub fn record_failure(&self, service: ServiceKind) -> Option<Transition> {
        let now = Instant::now();
        let mut inner = self.inner.lock().ok()?;
        let breaker = inner.get_mut(&service)?;
        match breaker.state {
            BreakerState::HalfOpen => {
                breaker.transition(BreakerState::Open, now);
                Some(Transition {
                    service,
                    from: BreakerState::HalfOpen,
                    to: BreakerState::Open,
                })
            }
            BreakerState::Closed => {
                breaker.consecutive_failures += 1;
                if breaker.consecutive_failures >= self.config.failure_threshold {
                    breaker.transition(BreakerState::Open, now);
                    Some(Transition {
                        service,
                        from: BreakerState::Closed,
                        to: BreakerState::Open,
                    })
                } else {
                    None
                }
            }
            BreakerState::Open => None,
        }
    }

    /// Returns the current state of one breaker.
    #[must_use]
    pub fn state(&self, service: ServiceKind) -> BreakerState {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.get(&service).map(|breaker| breaker.state))
            .unwrap_or(BreakerState::Closed)
    }

    /// Snapshots every breaker for health and gauges.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let now = Instant::now();
        self.inner.lock().map_or_else(
            |_| Vec::new(),
            |inner| {
                let mut views: Vec<BreakerSnapshot> = inner
                    .iter()
                    .map(|(service, breaker)| BreakerSnapshot {
                        service: *service,
                        state: breaker.state,
                        seconds_in_state: now.duration_since(breaker.last_change).as_secs_f64(),
                        open_count: breaker.open_count,
                    })
                    .collect();
                views.sort_by_key(|view| view.service);
                views
            },
        )
    }

    /// Renders breaker snapshots as health views.
    #[must_use]
    pub fn health_views(&self) -> Vec<BreakerHealthView> {
        self.snapshot()
            .into_iter()
            .map(|view| BreakerHealthView {
                service: view.service.as_str(),
                state: view.state.health_label(),
                seconds_in_state: view.seconds_in_state,
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
