use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exercise answers keyed by exercise index within the lesson.
///
/// Answers gate change detection only; the graded outcome travels in
/// [`ProgressSnapshot::score`].
pub type AnswerMap = BTreeMap<u32, String>;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress {0} is outside [0, 1]")]
    ProgressOutOfRange(f64),

    #[error("score {0} is outside [0, 100]")]
    ScoreOutOfRange(f64),
}

/// Immutable record of a learner's position in a lesson at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    progress: f64,
    time_spent_seconds: u64,
    completed: bool,
    score: Option<f64>,
    last_position: String,
    notes: Option<String>,
}

impl ProgressSnapshot {
    /// Validate and build a snapshot, e.g. from data arriving off the wire.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if `progress` falls outside `[0, 1]` or
    /// `score` outside `[0, 100]`. NaN fails both checks.
    pub fn new(
        progress: f64,
        time_spent_seconds: u64,
        completed: bool,
        score: Option<f64>,
        last_position: impl Into<String>,
        notes: Option<String>,
    ) -> Result<Self, ProgressError> {
        if !(0.0..=1.0).contains(&progress) {
            return Err(ProgressError::ProgressOutOfRange(progress));
        }
        if let Some(score) = score {
            if !(0.0..=100.0).contains(&score) {
                return Err(ProgressError::ScoreOutOfRange(score));
            }
        }
        Ok(Self {
            progress,
            time_spent_seconds,
            completed,
            score,
            last_position: last_position.into(),
            notes,
        })
    }

    /// Build a snapshot from live state, clamping values into range.
    ///
    /// This is the snapshot-builder path: it never fails.
    #[must_use]
    pub fn clamped(
        progress: f64,
        time_spent_seconds: u64,
        completed: bool,
        score: Option<f64>,
        last_position: impl Into<String>,
        notes: Option<String>,
    ) -> Self {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        let score = score.map(|s| if s.is_nan() { 0.0 } else { s.clamp(0.0, 100.0) });
        Self {
            progress,
            time_spent_seconds,
            completed,
            score,
            last_position: last_position.into(),
            notes,
        }
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    #[must_use]
    pub fn last_position(&self) -> &str {
        &self.last_position
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Field-wise equality on everything the store persists except `notes`.
    ///
    /// Notes are passed through untouched, so a notes-only difference never
    /// justifies another write.
    #[must_use]
    pub fn same_persisted_state(&self, other: &Self) -> bool {
        self.progress == other.progress
            && self.time_spent_seconds == other.time_spent_seconds
            && self.completed == other.completed
            && self.score == other.score
            && self.last_position == other.last_position
    }
}
