//! Connection health accounting and routing state.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Consecutive failures after which a constrained deployment declares a
/// temporary failure.
pub const FAILURE_THRESHOLD: u32 = 3;

/// Default grace window: how long after the last success a temporarily
/// failed connection keeps being reported available, to avoid flapping.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Where the facade should send an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Remote transport is usable (or still inside the grace window).
    Remote,
    /// Temporary failure outlived the grace window; serve from the
    /// in-memory index.
    Degraded,
    /// No usable path and degraded mode is not active.
    Unavailable,
}

#[derive(Debug)]
struct HealthState {
    available: bool,
    failed_attempts: u32,
    temporary_failure: bool,
    last_success: Option<Instant>,
    last_success_at: Option<DateTime<Utc>>,
}

impl HealthState {
    fn within_grace(&self, grace_window: Duration) -> bool {
        self.last_success
            .map(|at| at.elapsed() < grace_window)
            .unwrap_or(false)
    }
}

/// Availability state shared by the negotiator and the facade.
///
/// Every transition is a method and the lock is private, so the invariants
/// hold no matter how many tasks share the value: the failure counter only
/// resets on success or operator reset, and the temporary-failure flag is
/// cleared only by an operator reset or by a success that arrives after the
/// grace window has lapsed. The lock is never held across an await point.
#[derive(Debug)]
pub struct ConnectionHealth {
    state: RwLock<HealthState>,
    constrained: bool,
    grace_window: Duration,
}

impl ConnectionHealth {
    pub fn new(constrained: bool) -> Self {
        Self {
            state: RwLock::new(HealthState {
                available: false,
                failed_attempts: 0,
                temporary_failure: false,
                last_success: None,
                last_success_at: None,
            }),
            constrained,
            grace_window: DEFAULT_GRACE_WINDOW,
        }
    }

    /// Overrides the grace window; mainly for operators who want degraded
    /// mode to engage faster (or tests that cannot wait five minutes).
    pub fn with_grace_window(mut self, grace_window: Duration) -> Self {
        self.grace_window = grace_window;
        self
    }

    pub fn constrained(&self) -> bool {
        self.constrained
    }

    /// Records a successful remote interaction: reachable again, counter
    /// reset. A temporary failure is cleared only when the success arrives
    /// after the grace window already lapsed; inside the window the flag
    /// keeps its anti-flap role.
    pub fn record_success(&self) {
        let mut state = self.state.write();
        if state.temporary_failure && !state.within_grace(self.grace_window) {
            info!("Remote store recovered; temporary failure cleared");
            state.temporary_failure = false;
        }
        state.available = true;
        state.failed_attempts = 0;
        state.last_success = Some(Instant::now());
        state.last_success_at = Some(Utc::now());
    }

    /// Records a failed negotiation or availability check and returns the
    /// new consecutive-failure count. Crossing [`FAILURE_THRESHOLD`] in a
    /// constrained deployment declares a temporary failure (logged once per
    /// entry).
    pub fn record_failure(&self) -> u32 {
        let mut state = self.state.write();
        state.available = false;
        state.failed_attempts = state.failed_attempts.saturating_add(1);
        if self.constrained
            && !state.temporary_failure
            && state.failed_attempts >= FAILURE_THRESHOLD
        {
            state.temporary_failure = true;
            warn!(
                "Remote store declared temporarily failed after {} attempts; operations will be served in-memory",
                state.failed_attempts
            );
        }
        state.failed_attempts
    }

    /// Operator-driven exit from degraded mode: clears the temporary
    /// failure flag and the failure counter. Data handling is the facade's
    /// business; nothing here touches records.
    pub fn exit_degraded(&self) {
        let mut state = self.state.write();
        state.temporary_failure = false;
        state.failed_attempts = 0;
    }

    /// Routing decision: remote while reachable (or inside the grace
    /// window), degraded once a temporary failure outlives the window,
    /// otherwise unavailable.
    pub fn route(&self) -> Route {
        let state = self.state.read();
        if state.available {
            return Route::Remote;
        }
        if state.temporary_failure {
            if state.within_grace(self.grace_window) {
                Route::Remote
            } else {
                Route::Degraded
            }
        } else {
            Route::Unavailable
        }
    }

    pub fn is_available(&self) -> bool {
        self.route() == Route::Remote
    }

    pub fn temporary_failure(&self) -> bool {
        self.state.read().temporary_failure
    }

    pub fn failed_attempts(&self) -> u32 {
        self.state.read().failed_attempts
    }

    /// Point-in-time view for operator diagnostics.
    pub fn snapshot(&self) -> HealthSnapshot {
        let state = self.state.read();
        HealthSnapshot {
            available: state.available,
            failed_attempts: state.failed_attempts,
            temporary_failure: state.temporary_failure,
            // Same decision route() makes: an available connection is never
            // reported degraded, even when the anti-flap flag is still set.
            degraded_active: !state.available
                && state.temporary_failure
                && !state.within_grace(self.grace_window),
            last_success_at: state.last_success_at,
        }
    }
}

/// Snapshot of [`ConnectionHealth`] for diagnostics and callers that need
/// to distinguish "no matches" from "store unreachable".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub available: bool,
    pub failed_attempts: u32,
    pub temporary_failure: bool,
    /// True when operations are currently served by the in-memory index.
    pub degraded_active: bool,
    pub last_success_at: Option<DateTime<Utc>>,
}
