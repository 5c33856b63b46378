#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use lesson_core::model::{LessonId, ProgressSnapshot, UserId};
use services::{ProgressSyncEngine, ProgressSyncHandle, SyncConfig, SyncEvent};
use storage::repository::{ProgressStore, StoreError};

/// Store double that records every attempt, can inject failures, and
/// tracks how many writes overlap.
#[derive(Clone)]
pub struct RecordingStore {
    inner: Arc<Inner>,
}

struct Inner {
    latency: Duration,
    calls: Mutex<Vec<ProgressSnapshot>>,
    fail_next: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                latency,
                calls: Mutex::new(Vec::new()),
                fail_next: AtomicU32::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Fail the next `n` upserts with a network error.
    pub fn fail_times(&self, n: u32) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ProgressSnapshot> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    /// Highest number of writes ever observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressStore for RecordingStore {
    async fn upsert_progress(
        &self,
        _lesson_id: LessonId,
        _user_id: UserId,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StoreError> {
        let current = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.inner.latency.is_zero() {
            tokio::time::sleep(self.inner.latency).await;
        }

        self.inner.calls.lock().unwrap().push(snapshot.clone());
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failed = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Network("injected failure".into()));
        }
        Ok(())
    }
}

pub fn start_engine(
    store: &RecordingStore,
    total_sections: u32,
    initial: Option<ProgressSnapshot>,
) -> (ProgressSyncHandle, mpsc::UnboundedReceiver<SyncEvent>) {
    start_engine_with(SyncConfig::default(), store, total_sections, initial)
}

pub fn start_engine_with(
    config: SyncConfig,
    store: &RecordingStore,
    total_sections: u32,
    initial: Option<ProgressSnapshot>,
) -> (ProgressSyncHandle, mpsc::UnboundedReceiver<SyncEvent>) {
    ProgressSyncEngine::start(
        config,
        LessonId::new(7),
        UserId::random(),
        total_sections,
        initial,
        Arc::new(store.clone()),
    )
}
