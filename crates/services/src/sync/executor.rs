use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use super::change::TriggerKind;

/// The single write slot, with a one-deep queue of retry intent behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaveState {
    Idle,
    Saving {
        kind: TriggerKind,
        queued: Option<TriggerKind>,
    },
}

/// What `submit` decided to do with a candidate save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitAction {
    /// Slot was free; start the write after the given pre-delay.
    Start { delay: Duration },
    /// A write is in flight; the intent was queued behind it.
    Queued,
}

#[derive(Debug)]
pub(crate) struct SaveExecutor {
    state: SaveState,
}

impl SaveExecutor {
    pub fn new() -> Self {
        Self {
            state: SaveState::Idle,
        }
    }

    pub fn is_saving(&self) -> bool {
        self.state != SaveState::Idle
    }

    /// Claim the write slot or queue behind it.
    ///
    /// Automatic starts carry a jittered pre-delay that grows with the
    /// consecutive-failure count; manual starts run immediately.
    pub fn submit(
        &mut self,
        kind: TriggerKind,
        attempts: u32,
        base: Duration,
        max_multiplier: u32,
    ) -> SubmitAction {
        match &mut self.state {
            SaveState::Idle => {
                self.state = SaveState::Saving { kind, queued: None };
                let delay = match kind {
                    TriggerKind::Manual => Duration::ZERO,
                    TriggerKind::Automatic => jittered_delay(base, attempts, max_multiplier),
                };
                SubmitAction::Start { delay }
            }
            SaveState::Saving { queued, .. } => {
                // A queued manual intent is never downgraded by a later
                // automatic trigger.
                *queued = match (*queued, kind) {
                    (Some(TriggerKind::Manual), _) => Some(TriggerKind::Manual),
                    (_, kind) => Some(kind),
                };
                SubmitAction::Queued
            }
        }
    }

    /// Release the slot after the in-flight write finished.
    ///
    /// Returns the queued intent to resubmit, if the completion rule allows
    /// it: immediately after a manual write, or after an automatic write
    /// only when the last successful save is at least `auto_min_interval`
    /// old. Otherwise the queued intent is dropped.
    pub fn complete(
        &mut self,
        now: Instant,
        last_saved_at: Option<Instant>,
        auto_min_interval: Duration,
    ) -> Option<TriggerKind> {
        let SaveState::Saving { kind, queued } = self.state else {
            return None;
        };
        self.state = SaveState::Idle;
        let queued = queued?;

        let resubmit = match kind {
            TriggerKind::Manual => true,
            TriggerKind::Automatic => last_saved_at
                .is_none_or(|at| now.saturating_duration_since(at) >= auto_min_interval),
        };
        resubmit.then_some(queued)
    }
}

/// Uniform random delay in `[0, base × min(2^attempts, cap)]`.
///
/// The randomization spreads simultaneous sessions apart; the geometric
/// growth backs a failing store off.
pub(crate) fn jittered_delay(base: Duration, attempts: u32, max_multiplier: u32) -> Duration {
    let multiplier = 2_u32
        .checked_pow(attempts)
        .map_or(max_multiplier, |m| m.min(max_multiplier));
    let bound = base.saturating_mul(multiplier);
    let bound_millis = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::rng().random_range(0..=bound_millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(500);
    const INTERVAL: Duration = Duration::from_secs(60);

    #[test]
    fn manual_submit_starts_without_delay() {
        let mut executor = SaveExecutor::new();
        let action = executor.submit(TriggerKind::Manual, 0, BASE, 32);
        assert_eq!(
            action,
            SubmitAction::Start {
                delay: Duration::ZERO
            }
        );
        assert!(executor.is_saving());
    }

    #[test]
    fn submissions_queue_behind_the_in_flight_write() {
        let mut executor = SaveExecutor::new();
        executor.submit(TriggerKind::Automatic, 0, BASE, 32);

        assert_eq!(
            executor.submit(TriggerKind::Manual, 0, BASE, 32),
            SubmitAction::Queued
        );
        // A later automatic trigger must not downgrade the queued manual.
        executor.submit(TriggerKind::Automatic, 0, BASE, 32);

        let queued = executor.complete(Instant::now(), None, INTERVAL);
        assert_eq!(queued, Some(TriggerKind::Manual));
        assert!(!executor.is_saving());
    }

    #[test]
    fn queued_intent_resubmits_after_manual_completion() {
        let mut executor = SaveExecutor::new();
        executor.submit(TriggerKind::Manual, 0, BASE, 32);
        executor.submit(TriggerKind::Automatic, 0, BASE, 32);

        let now = Instant::now();
        // Even with a fresh successful save, a completed manual write lets
        // the queued intent through.
        assert_eq!(
            executor.complete(now, Some(now), INTERVAL),
            Some(TriggerKind::Automatic)
        );
    }

    #[test]
    fn queued_intent_drops_when_automatic_completion_is_recent() {
        let mut executor = SaveExecutor::new();
        executor.submit(TriggerKind::Automatic, 0, BASE, 32);
        executor.submit(TriggerKind::Automatic, 0, BASE, 32);

        let now = Instant::now();
        assert_eq!(executor.complete(now, Some(now), INTERVAL), None);
        assert!(!executor.is_saving());
    }

    #[test]
    fn queued_intent_survives_automatic_completion_when_save_is_stale() {
        let mut executor = SaveExecutor::new();
        executor.submit(TriggerKind::Automatic, 0, BASE, 32);
        executor.submit(TriggerKind::Automatic, 0, BASE, 32);

        let now = Instant::now();
        let stale = now - INTERVAL;
        assert_eq!(
            executor.complete(now, Some(stale), INTERVAL),
            Some(TriggerKind::Automatic)
        );
    }

    #[test]
    fn jittered_delay_stays_within_the_geometric_bound() {
        for _ in 0..100 {
            assert!(jittered_delay(BASE, 0, 32) <= BASE);
            assert!(jittered_delay(BASE, 1, 32) <= BASE * 2);
            assert!(jittered_delay(BASE, 3, 32) <= BASE * 8);
        }
    }

    #[test]
    fn jittered_delay_caps_the_multiplier() {
        for attempts in [5, 6, 31, 32, 200] {
            assert!(jittered_delay(BASE, attempts, 32) <= BASE * 32);
        }
    }
}
