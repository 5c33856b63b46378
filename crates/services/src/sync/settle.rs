use std::time::Duration;

use tokio::time::Instant;

/// Tracks how long the user has been idle on the current state, plus the
/// rate-limit timestamps for both save kinds.
#[derive(Debug, Clone)]
pub(crate) struct SettleTracker {
    last_settled_at: Instant,
    last_saved_at: Option<Instant>,
    last_manual_attempt_at: Option<Instant>,
}

impl SettleTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            last_settled_at: now,
            last_saved_at: None,
            last_manual_attempt_at: None,
        }
    }

    /// Record a state-changing user action.
    pub fn mark_activity(&mut self, now: Instant) {
        self.last_settled_at = now;
    }

    /// Record an accepted save.
    pub fn mark_saved(&mut self, now: Instant) {
        self.last_saved_at = Some(now);
    }

    pub fn is_settled(&self, now: Instant, min: Duration) -> bool {
        now.saturating_duration_since(self.last_settled_at) >= min
    }

    /// Earliest instant at which the current state counts as settled.
    pub fn settle_deadline(&self, min: Duration) -> Instant {
        self.last_settled_at + min
    }

    /// Whether enough time has passed since the last successful save for
    /// another automatic attempt.
    pub fn auto_save_due(&self, now: Instant, min_interval: Duration) -> bool {
        self.last_saved_at
            .is_none_or(|at| now.saturating_duration_since(at) >= min_interval)
    }

    /// Gate and record a manual attempt in one step; returns false when the
    /// attempt lands inside the rate window and is absorbed.
    pub fn note_manual_attempt(&mut self, now: Instant, min_interval: Duration) -> bool {
        let absorbed = self
            .last_manual_attempt_at
            .is_some_and(|at| now.saturating_duration_since(at) < min_interval);
        if absorbed {
            return false;
        }
        self.last_manual_attempt_at = Some(now);
        true
    }

    pub fn last_saved_at(&self) -> Option<Instant> {
        self.last_saved_at
    }
}
