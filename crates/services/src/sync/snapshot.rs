use tokio::time::Instant;

use lesson_core::model::{AnswerMap, ProgressSnapshot};

/// Live lesson state the engine snapshots from.
///
/// Owned by the engine task; the UI feeds it through handle commands only.
#[derive(Debug, Clone)]
pub struct LessonState {
    section_index: u32,
    total_sections: u32,
    accumulated_seconds: u64,
    segment_started_at: Instant,
    completed: bool,
    score: Option<f64>,
    answers: AnswerMap,
    notes: Option<String>,
}

impl LessonState {
    /// Build the state for a freshly opened lesson view, seeding from any
    /// previously persisted snapshot.
    #[must_use]
    pub fn hydrate(total_sections: u32, initial: Option<&ProgressSnapshot>, now: Instant) -> Self {
        let section_index = initial
            .and_then(|snapshot| snapshot.last_position().parse().ok())
            .map_or(0, |index: u32| clamp_section(index, total_sections));
        Self {
            section_index,
            total_sections,
            accumulated_seconds: initial.map_or(0, ProgressSnapshot::time_spent_seconds),
            segment_started_at: now,
            completed: initial.is_some_and(ProgressSnapshot::completed),
            score: initial.and_then(ProgressSnapshot::score),
            answers: AnswerMap::new(),
            notes: initial.and_then(|snapshot| snapshot.notes().map(ToOwned::to_owned)),
        }
    }

    /// Produce a snapshot of the current state. Pure and infallible.
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> ProgressSnapshot {
        let elapsed = now
            .saturating_duration_since(self.segment_started_at)
            .as_secs();
        ProgressSnapshot::clamped(
            lesson_progress(self.section_index, self.total_sections),
            self.accumulated_seconds.saturating_add(elapsed),
            self.completed,
            self.score,
            self.section_index.to_string(),
            self.notes.clone(),
        )
    }

    #[must_use]
    pub fn section_index(&self) -> u32 {
        self.section_index
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    /// Move to a new section; returns whether the position actually changed.
    pub(crate) fn set_section(&mut self, index: u32) -> bool {
        let index = clamp_section(index, self.total_sections);
        if index == self.section_index {
            return false;
        }
        self.section_index = index;
        true
    }

    /// Record an answer; returns whether the stored value changed.
    pub(crate) fn set_answer(&mut self, exercise: u32, value: String) -> bool {
        if self.answers.get(&exercise) == Some(&value) {
            return false;
        }
        self.answers.insert(exercise, value);
        true
    }

    pub(crate) fn set_score(&mut self, score: Option<f64>) -> bool {
        if self.score == score {
            return false;
        }
        self.score = score;
        true
    }

    /// Completion is sticky: once set it is never cleared.
    pub(crate) fn mark_completed(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        true
    }
}

fn clamp_section(index: u32, total_sections: u32) -> u32 {
    if total_sections == 0 {
        index
    } else {
        index.min(total_sections - 1)
    }
}

fn lesson_progress(section_index: u32, total_sections: u32) -> f64 {
    if total_sections == 0 {
        0.0
    } else {
        f64::from(section_index + 1) / f64::from(total_sections)
    }
}
