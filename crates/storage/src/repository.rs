use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::{LessonId, ProgressError, ProgressSnapshot, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by progress store adapters.
///
/// Both variants are handled identically by the sync engine; the split
/// exists so callers can tell connectivity problems from store-side
/// rejections when reporting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("rejected by store: {0}")]
    Rejected(String),
}

/// Remote progress store contract.
///
/// The store is an idempotent upsert keyed by lesson and user: repeating
/// the same snapshot is safe, and the last accepted write wins.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Persist or replace the progress snapshot for one lesson and user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Network` for connectivity failures and
    /// `StoreError::Rejected` when the store refuses the write.
    async fn upsert_progress(
        &self,
        lesson_id: LessonId,
        user_id: UserId,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StoreError>;
}

/// Persisted shape for a progress snapshot.
///
/// This mirrors the domain `ProgressSnapshot` so store adapters can
/// serialize without leaking wire concerns into the domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub lesson_id: LessonId,
    pub user_id: UserId,
    pub progress: f64,
    pub time_spent_seconds: u64,
    pub completed: bool,
    pub score: Option<f64>,
    pub last_position: String,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_snapshot(
        lesson_id: LessonId,
        user_id: UserId,
        snapshot: &ProgressSnapshot,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            lesson_id,
            user_id,
            progress: snapshot.progress(),
            time_spent_seconds: snapshot.time_spent_seconds(),
            completed: snapshot.completed(),
            score: snapshot.score(),
            last_position: snapshot.last_position().to_owned(),
            notes: snapshot.notes().map(ToOwned::to_owned),
            updated_at,
        }
    }

    /// Convert the record back into a domain `ProgressSnapshot`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the persisted values fail range validation.
    pub fn into_snapshot(self) -> Result<ProgressSnapshot, ProgressError> {
        ProgressSnapshot::new(
            self.progress,
            self.time_spent_seconds,
            self.completed,
            self.score,
            self.last_position,
            self.notes,
        )
    }
}

/// In-memory progress store for tests and offline use.
#[derive(Clone, Default)]
pub struct InMemoryProgressStore {
    records: Arc<Mutex<HashMap<(LessonId, UserId), ProgressSnapshot>>>,
}

impl InMemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last snapshot accepted for the given lesson and user.
    #[must_use]
    pub fn saved(&self, lesson_id: LessonId, user_id: UserId) -> Option<ProgressSnapshot> {
        self.records
            .lock()
            .ok()?
            .get(&(lesson_id, user_id))
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn upsert_progress(
        &self,
        lesson_id: LessonId,
        user_id: UserId,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        guard.insert((lesson_id, user_id), snapshot.clone());
        Ok(())
    }
}
