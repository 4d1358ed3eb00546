//! Connection supervision policy
//!
//! Bounded-retry-then-reconnect state machine for the capture loop.
//! Keeping the decision logic here, free of sockets and sleeps, lets the
//! policy be tested exactly: N consecutive read failures trigger one
//! reconnect cycle, then counting restarts.

use std::time::Duration;

/// Consecutive read failures tolerated before forcing a reconnect
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 3;

/// Pause between retries of the same handle
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Minimum pause before re-opening a released connection
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(1);

/// Pause after a failed reconnect before the cycle restarts
pub const RECONNECT_FAILED_BACKOFF: Duration = Duration::from_secs(5);

/// What the capture loop should do after a failed read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Sleep [`RETRY_BACKOFF`] and retry the same handle
    Backoff,
    /// Release the connection and run one reconnect cycle
    Reconnect,
}

/// Tracks consecutive read failures and decides when to reconnect
#[derive(Debug)]
pub struct ConnectionSupervisor {
    failed_attempts: u32,
    max_failed_attempts: u32,
}

impl ConnectionSupervisor {
    pub fn new(max_failed_attempts: u32) -> Self {
        Self {
            failed_attempts: 0,
            max_failed_attempts,
        }
    }

    /// A frame was read successfully; the failure streak resets
    pub fn on_success(&mut self) {
        self.failed_attempts = 0;
    }

    /// A read failed; returns the action the loop should take.
    ///
    /// The failure counter resets when `Reconnect` is returned, so a
    /// fresh streak of failures is required to trigger the next cycle.
    pub fn on_failure(&mut self) -> RecoveryAction {
        self.failed_attempts += 1;
        if self.failed_attempts >= self.max_failed_attempts {
            self.failed_attempts = 0;
            RecoveryAction::Reconnect
        } else {
            RecoveryAction::Backoff
        }
    }

    /// Current failure streak (for logging)
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILED_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_after_three_failures() {
        let mut sup = ConnectionSupervisor::default();
        assert_eq!(sup.on_failure(), RecoveryAction::Backoff);
        assert_eq!(sup.on_failure(), RecoveryAction::Backoff);
        assert_eq!(sup.on_failure(), RecoveryAction::Reconnect);
    }

    #[test]
    fn test_success_resets_streak() {
        let mut sup = ConnectionSupervisor::default();
        sup.on_failure();
        sup.on_failure();
        sup.on_success();
        assert_eq!(sup.on_failure(), RecoveryAction::Backoff);
        assert_eq!(sup.on_failure(), RecoveryAction::Backoff);
        assert_eq!(sup.on_failure(), RecoveryAction::Reconnect);
    }

    #[test]
    fn test_exactly_one_reconnect_per_streak() {
        let mut sup = ConnectionSupervisor::default();
        let mut reconnects = 0;
        for _ in 0..9 {
            if sup.on_failure() == RecoveryAction::Reconnect {
                reconnects += 1;
            }
        }
        // 9 consecutive failures = 3 full cycles
        assert_eq!(reconnects, 3);
    }
}
