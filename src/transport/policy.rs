//! Retry policy shared by every remote call site.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Classification of a retryable failure, used to pick the backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// Connection refused/reset, DNS failure, or a per-attempt timeout.
    Network,
    /// HTTP 5xx.
    Server,
    /// HTTP 429.
    RateLimited,
}

/// Bounded-retry parameters applied to every remote call.
///
/// One policy value is built from configuration and shared; call sites never
/// hand-roll their own delays. The schedule is deliberately jitter-free so
/// consecutive delays for a fixed kind are monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// First delay for network and server failures; doubles each attempt.
    pub base_delay: Duration,
    /// First delay after HTTP 429. Starts higher than `base_delay` so rate
    /// limiting backs off harder than a flaky server does.
    pub rate_limit_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Wall-clock budget for one logical call, attempts and waits included.
    pub budget: Duration,
    /// Timeout applied to each individual attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            rate_limit_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            budget: Duration::from_secs(60),
            attempt_timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Variant of this policy for availability probes: a single attempt with
    /// a short timeout, so a re-check never waits out the full schedule.
    pub fn probe(&self) -> Self {
        let timeout = self.attempt_timeout.min(Duration::from_secs(5));
        Self {
            max_retries: 0,
            attempt_timeout: timeout,
            budget: timeout,
            ..self.clone()
        }
    }

    /// Whether an HTTP status is worth another attempt.
    pub fn is_retryable_status(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }

    /// Delay taken before retry number `attempt` (zero-based: the wait after
    /// the first failed attempt is `attempt = 0`).
    ///
    /// Doubles from the schedule's base each attempt and never exceeds
    /// `max_delay`.
    pub fn backoff(&self, attempt: u32, kind: RetryKind) -> Duration {
        let base = match kind {
            RetryKind::RateLimited => self.rate_limit_delay,
            RetryKind::Network | RetryKind::Server => self.base_delay,
        };
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        base.saturating_mul(factor).min(self.max_delay)
    }

    /// Clamps an externally-suggested delay (e.g. `Retry-After`) to the cap.
    pub fn clamp(&self, delay: Duration) -> Duration {
        delay.min(self.max_delay)
    }
}
