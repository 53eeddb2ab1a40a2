//! Rate limiting for automatic replenishment.
//!
//! A crash-looping workload would otherwise hot-loop the spawn path: every
//! failed spawn is an immediate exit, which triggers another replenishment.
//! The governor bounds that loop two ways:
//!
//! 1. **Failure window**: after too many spawn failures inside a sliding
//!    window, governed attempts are suppressed until the window drains.
//! 2. **Backoff**: consecutive failures impose an exponentially growing
//!    delay (with jitter) before the next governed attempt.
//!
//! Only automatic replenishment is governed. Operator-requested growth and
//! the initial fill bypass it.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use rand::Rng;

use foreman_core::types::Timestamp;

/// Sliding window for counting spawn failures.
pub const FAILURE_WINDOW: Duration = Duration::from_secs(60);

/// Maximum spawn failures tolerated inside the window.
pub const MAX_FAILURES_IN_WINDOW: usize = 10;

/// Backoff after the first consecutive failure.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Cap on the exponential backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Why a governed spawn attempt was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The backoff delay from consecutive failures has not elapsed yet.
    BackoffPending,
    /// Too many spawn failures inside the sliding window.
    FailureStorm,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackoffPending => write!(f, "backoff pending"),
            Self::FailureStorm => write!(f, "failure storm"),
        }
    }
}

/// Governor for automatic replenishment attempts.
#[derive(Debug)]
pub struct RespawnGovernor {
    /// Timestamps of recent spawn failures, oldest first.
    failures: VecDeque<Timestamp>,
    /// Consecutive failures since the last success.
    consecutive_failures: u32,
    /// Earliest time the next governed attempt is allowed.
    next_attempt_at: Option<Timestamp>,
}

impl RespawnGovernor {
    /// Create a governor with no failure history.
    pub fn new() -> Self {
        Self {
            failures: VecDeque::new(),
            consecutive_failures: 0,
            next_attempt_at: None,
        }
    }

    /// Check whether a governed spawn attempt is allowed at `now`.
    pub fn check(&mut self, now: Timestamp) -> Result<(), DenyReason> {
        self.prune(now);

        if self.failures.len() >= MAX_FAILURES_IN_WINDOW {
            return Err(DenyReason::FailureStorm);
        }

        if let Some(at) = self.next_attempt_at
            && now < at
        {
            return Err(DenyReason::BackoffPending);
        }

        Ok(())
    }

    /// Record a failed governed spawn at `now`.
    pub fn record_failure(&mut self, now: Timestamp) {
        self.prune(now);
        self.failures.push_back(now);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let delay = backoff_delay(self.consecutive_failures);
        self.next_attempt_at = now.checked_add_signed(
            ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::MAX),
        );
    }

    /// Record a successful governed spawn, resetting the backoff.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.next_attempt_at = None;
    }

    /// Spawn failures currently inside the window.
    pub fn recent_failures(&self) -> usize {
        self.failures.len()
    }

    fn prune(&mut self, now: Timestamp) {
        let window = ChronoDuration::from_std(FAILURE_WINDOW).unwrap_or_else(|_| ChronoDuration::MAX);
        while let Some(oldest) = self.failures.front() {
            if now.signed_duration_since(*oldest) >= window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RespawnGovernor {
    fn default() -> Self {
        Self::new()
    }
}

/// Backoff delay after `consecutive_failures` failures, with ±25% jitter.
fn backoff_delay(consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.saturating_sub(1).min(31);
    let base = INITIAL_BACKOFF.as_secs_f64() * 2f64.powi(exponent as i32);
    let capped = base.min(MAX_BACKOFF.as_secs_f64());

    let jitter_range = capped * 0.25;
    let mut rng = rand::rng();
    let jitter = rng.random_range(-jitter_range..=jitter_range);
    let delayed = (capped + jitter).max(0.0).min(MAX_BACKOFF.as_secs_f64());

    Duration::from_secs_f64(delayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_fresh_governor_allows() {
        let mut governor = RespawnGovernor::new();
        assert_eq!(governor.check(Utc::now()), Ok(()));
    }

    #[test]
    fn test_backoff_gates_after_failure() {
        let mut governor = RespawnGovernor::new();
        let now = Utc::now();

        governor.record_failure(now);
        assert_eq!(governor.check(now), Err(DenyReason::BackoffPending));

        // Well past the capped maximum backoff the attempt is allowed again.
        let later = now + chrono::Duration::seconds(60);
        assert_eq!(governor.check(later), Ok(()));
    }

    #[test]
    fn test_success_resets_backoff() {
        let mut governor = RespawnGovernor::new();
        let now = Utc::now();

        governor.record_failure(now);
        governor.record_success();
        assert_eq!(governor.check(now), Ok(()));
    }

    #[test]
    fn test_failure_storm_suppresses() {
        let mut governor = RespawnGovernor::new();
        let now = Utc::now();

        for _ in 0..MAX_FAILURES_IN_WINDOW {
            governor.record_failure(now);
        }
        governor.record_success();

        // Backoff is reset, but the window still holds the failures.
        assert_eq!(governor.check(now), Err(DenyReason::FailureStorm));
        assert_eq!(governor.recent_failures(), MAX_FAILURES_IN_WINDOW);
    }

    #[test]
    fn test_window_drains() {
        let mut governor = RespawnGovernor::new();
        let then = Utc::now() - chrono::Duration::seconds(120);

        for _ in 0..MAX_FAILURES_IN_WINDOW {
            governor.record_failure(then);
        }
        governor.record_success();

        let now = Utc::now();
        assert_eq!(governor.check(now), Ok(()));
        assert_eq!(governor.recent_failures(), 0);
    }

    #[test]
    fn test_backoff_delay_grows_and_caps() {
        for _ in 0..50 {
            let first = backoff_delay(1);
            assert!(first <= Duration::from_millis(1_250));

            let capped = backoff_delay(20);
            assert!(capped <= MAX_BACKOFF);
        }
    }
}
