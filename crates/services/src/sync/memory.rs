use tokio::time::Instant;

use lesson_core::model::{AnswerMap, ProgressSnapshot};

use super::change::TriggerState;
use super::settle::SettleTracker;

/// All mutable coordination state for one open lesson view.
///
/// Owned exclusively by the engine task; the stages borrow it instead of
/// holding their own cells.
#[derive(Debug)]
pub(crate) struct EngineMemory {
    /// Most recent snapshot the store accepted; identity-guard baseline.
    pub last_saved: Option<ProgressSnapshot>,
    /// Change-detection baseline as of the last successful save.
    pub baseline: TriggerState,
    pub settle: SettleTracker,
    /// Consecutive-failure counter driving backoff; reset on success.
    pub attempts: u32,
    /// Raised once teardown begins; only the final flush runs past it.
    pub cancelled: bool,
}

impl EngineMemory {
    pub fn hydrate(initial: Option<&ProgressSnapshot>, now: Instant) -> Self {
        Self {
            last_saved: initial.cloned(),
            baseline: initial.map(TriggerState::from_snapshot).unwrap_or_default(),
            settle: SettleTracker::new(now),
            attempts: 0,
            cancelled: false,
        }
    }

    /// Record a successful write: new identity baseline, counters reset.
    pub fn record_saved(&mut self, snapshot: &ProgressSnapshot, answers: &AnswerMap, now: Instant) {
        self.last_saved = Some(snapshot.clone());
        self.baseline = TriggerState::from_saved(snapshot, answers.clone());
        self.attempts = 0;
        self.settle.mark_saved(now);
    }
}
