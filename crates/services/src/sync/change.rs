use lesson_core::model::{AnswerMap, ProgressSnapshot};

use super::config::SyncConfig;

/// How a save attempt was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Automatic,
    Manual,
}

/// Change-detection baseline: lesson state as of the last successful save.
#[derive(Debug, Clone, Default)]
pub(crate) struct TriggerState {
    pub section_index: u32,
    pub time_spent_seconds: u64,
    pub completed: bool,
    pub score: Option<f64>,
    pub answers: AnswerMap,
}

impl TriggerState {
    /// Baseline for a hydrated view; answers start empty because the store
    /// does not persist them.
    pub fn from_snapshot(snapshot: &ProgressSnapshot) -> Self {
        Self::from_saved(snapshot, AnswerMap::new())
    }

    pub fn from_saved(snapshot: &ProgressSnapshot, answers: AnswerMap) -> Self {
        Self {
            section_index: snapshot.last_position().parse().unwrap_or(0),
            time_spent_seconds: snapshot.time_spent_seconds(),
            completed: snapshot.completed(),
            score: snapshot.score(),
            answers,
        }
    }
}

/// Decide whether a candidate snapshot moved far enough from the baseline
/// to warrant a save attempt.
///
/// Section, completion, score, and answer changes always count; a
/// time-spent delta counts only past the per-kind threshold.
pub(crate) fn has_meaningful_change(
    candidate: &ProgressSnapshot,
    answers: &AnswerMap,
    baseline: &TriggerState,
    kind: TriggerKind,
    config: &SyncConfig,
) -> bool {
    if candidate.last_position() != baseline.section_index.to_string() {
        return true;
    }
    if candidate.completed() != baseline.completed {
        return true;
    }
    if candidate.score() != baseline.score {
        return true;
    }
    // BTreeMap equality covers both a differing answered-index set and a
    // differing value for an existing index.
    if *answers != baseline.answers {
        return true;
    }

    let threshold = match kind {
        TriggerKind::Automatic => config.auto_time_delta,
        TriggerKind::Manual => config.manual_time_delta,
    };
    candidate
        .time_spent_seconds()
        .saturating_sub(baseline.time_spent_seconds)
        > threshold.as_secs()
}

/// Identity guard: a candidate equal to the last saved snapshot is never
/// worth another write, whatever the change detector says.
pub(crate) fn is_redundant(
    candidate: &ProgressSnapshot,
    last_saved: Option<&ProgressSnapshot>,
) -> bool {
    last_saved.is_some_and(|saved| saved.same_persisted_state(candidate))
}
