use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

use lesson_core::model::{AnswerMap, LessonId, ProgressSnapshot, UserId};
use storage::repository::{ProgressStore, StoreError};

use super::change::{self, TriggerKind};
use super::coalesce::{Coalesced, SaveCoalescer};
use super::config::SyncConfig;
use super::executor::{SaveExecutor, SubmitAction};
use super::memory::EngineMemory;
use super::snapshot::LessonState;
use crate::error::SyncError;

/// User-visible save outcomes; emitted for manual saves only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ManualSaveSucceeded,
    ManualSaveFailed(SyncError),
}

#[derive(Debug)]
enum Command {
    SectionChanged(u32),
    AnswerChanged { exercise: u32, value: String },
    ScoreChanged(Option<f64>),
    MarkCompleted,
    ManualSave,
    Teardown,
}

struct WriteDone {
    kind: TriggerKind,
    snapshot: ProgressSnapshot,
    answers: AnswerMap,
    result: Result<(), StoreError>,
}

/// Handle the lesson view drives the engine with.
///
/// Cloneable; dropping every clone tears the engine down the same way an
/// explicit `teardown` does.
#[derive(Clone)]
pub struct ProgressSyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    saving: watch::Receiver<bool>,
}

impl ProgressSyncHandle {
    pub fn section_changed(&self, index: u32) {
        let _ = self.commands.send(Command::SectionChanged(index));
    }

    pub fn answer_changed(&self, exercise: u32, value: impl Into<String>) {
        let _ = self.commands.send(Command::AnswerChanged {
            exercise,
            value: value.into(),
        });
    }

    pub fn score_changed(&self, score: Option<f64>) {
        let _ = self.commands.send(Command::ScoreChanged(score));
    }

    pub fn mark_completed(&self) {
        let _ = self.commands.send(Command::MarkCompleted);
    }

    pub fn manual_save(&self) {
        let _ = self.commands.send(Command::ManualSave);
    }

    /// Tear the engine down; idempotent, later commands are ignored.
    pub fn teardown(&self) {
        let _ = self.commands.send(Command::Teardown);
    }

    /// True while a write (or its pre-delay) is in flight.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        *self.saving.borrow()
    }

    /// Watch the saving flag, e.g. to disable a save control.
    #[must_use]
    pub fn saving_flag(&self) -> watch::Receiver<bool> {
        self.saving.clone()
    }
}

/// Progress synchronization engine for one open lesson view.
///
/// Owns every piece of mutable coordination state and runs as a single
/// task: handle commands, write completions, the debounce deadline, and
/// the auto-save tick all funnel through one loop, so no two network
/// writes can ever start concurrently.
pub struct ProgressSyncEngine {
    config: SyncConfig,
    lesson_id: LessonId,
    user_id: UserId,
    store: Arc<dyn ProgressStore>,
    state: LessonState,
    memory: EngineMemory,
    executor: SaveExecutor,
    coalescer: SaveCoalescer,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SyncEvent>,
    saving: watch::Sender<bool>,
    cancel: watch::Sender<bool>,
    done_tx: mpsc::UnboundedSender<WriteDone>,
    done_rx: mpsc::UnboundedReceiver<WriteDone>,
    next_tick: Instant,
}

impl ProgressSyncEngine {
    /// Hydrate engine memory from any previously persisted snapshot and
    /// spawn the engine task.
    ///
    /// Returns the command handle and the manual-save event stream.
    pub fn start(
        config: SyncConfig,
        lesson_id: LessonId,
        user_id: UserId,
        total_sections: u32,
        initial: Option<ProgressSnapshot>,
        store: Arc<dyn ProgressStore>,
    ) -> (ProgressSyncHandle, mpsc::UnboundedReceiver<SyncEvent>) {
        let now = Instant::now();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (saving_tx, saving_rx) = watch::channel(false);
        let (cancel_tx, _) = watch::channel(false);
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let engine = Self {
            state: LessonState::hydrate(total_sections, initial.as_ref(), now),
            memory: EngineMemory::hydrate(initial.as_ref(), now),
            executor: SaveExecutor::new(),
            coalescer: SaveCoalescer::new(config.debounce_window, config.debounce_ceiling),
            next_tick: now + config.auto_save_period,
            config,
            lesson_id,
            user_id,
            store,
            commands: command_rx,
            events: event_tx,
            saving: saving_tx,
            cancel: cancel_tx,
            done_tx,
            done_rx,
        };
        tokio::spawn(engine.run());

        let handle = ProgressSyncHandle {
            commands: command_tx,
            saving: saving_rx,
        };
        (handle, event_rx)
    }

    async fn run(mut self) {
        loop {
            let fire_at = self.coalescer.deadline();
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Teardown) | None => {
                        self.teardown();
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                },
                Some(done) = self.done_rx.recv() => self.handle_write_done(done),
                _ = tokio::time::sleep_until(self.next_tick) => self.handle_tick(),
                _ = tokio::time::sleep_until(fire_at.unwrap_or_else(far_future)), if fire_at.is_some() => {
                    self.handle_debounce_fire();
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        let now = Instant::now();
        match cmd {
            Command::SectionChanged(index) => {
                if self.state.set_section(index) {
                    self.state_changed(now);
                }
            }
            Command::AnswerChanged { exercise, value } => {
                if self.state.set_answer(exercise, value) {
                    self.state_changed(now);
                }
            }
            Command::ScoreChanged(score) => {
                if self.state.set_score(score) {
                    self.state_changed(now);
                }
            }
            Command::MarkCompleted => {
                if self.state.mark_completed() {
                    self.state_changed(now);
                }
            }
            Command::ManualSave => self.manual_save(now),
            // Intercepted by the run loop.
            Command::Teardown => {}
        }
    }

    /// A state-changing user action: reset the settle clock and open or
    /// extend the debounce burst.
    fn state_changed(&mut self, now: Instant) {
        self.memory.settle.mark_activity(now);
        let _ = self.coalescer.note(TriggerKind::Automatic, now);
    }

    fn manual_save(&mut self, now: Instant) {
        if !self
            .memory
            .settle
            .note_manual_attempt(now, self.config.manual_min_interval)
        {
            debug!("manual save absorbed by rate limit");
            return;
        }
        if let Coalesced::FireNow = self.coalescer.note(TriggerKind::Manual, now) {
            self.try_save(TriggerKind::Manual, now);
        }
    }

    fn handle_tick(&mut self) {
        let now = Instant::now();
        // An automatic trigger through the normal gates; time spent accrues
        // through the snapshot builder, not here.
        let _ = self.coalescer.note(TriggerKind::Automatic, now);
        // Re-arm only after this tick's work is done.
        self.next_tick = now + self.config.auto_save_period;
    }

    fn handle_debounce_fire(&mut self) {
        let now = Instant::now();
        if !self
            .memory
            .settle
            .is_settled(now, self.config.settle_threshold)
        {
            // Hold the burst until the user stops interacting.
            self.coalescer
                .defer_until(self.memory.settle.settle_deadline(self.config.settle_threshold));
            return;
        }
        if self.coalescer.take_due(now) {
            self.try_save(TriggerKind::Automatic, now);
        }
    }

    /// Build a fresh snapshot and run it through the save gates.
    fn try_save(&mut self, kind: TriggerKind, now: Instant) {
        if self.memory.cancelled {
            return;
        }
        if kind == TriggerKind::Automatic
            && !self
                .memory
                .settle
                .auto_save_due(now, self.config.auto_save_min_interval)
        {
            debug!("automatic save skipped: rate limited");
            return;
        }

        let candidate = self.state.snapshot(now);
        if change::is_redundant(&candidate, self.memory.last_saved.as_ref()) {
            debug!("save skipped: identical to last saved snapshot");
            return;
        }
        if !change::has_meaningful_change(
            &candidate,
            self.state.answers(),
            &self.memory.baseline,
            kind,
            &self.config,
        ) {
            return;
        }
        self.dispatch(candidate, kind);
    }

    fn dispatch(&mut self, snapshot: ProgressSnapshot, kind: TriggerKind) {
        match self.executor.submit(
            kind,
            self.memory.attempts,
            self.config.backoff_base,
            self.config.backoff_max_multiplier,
        ) {
            SubmitAction::Start { delay } => self.start_write(snapshot, kind, delay),
            SubmitAction::Queued => debug!("save queued behind in-flight write"),
        }
    }

    fn start_write(&mut self, snapshot: ProgressSnapshot, kind: TriggerKind, delay: Duration) {
        let _ = self.saving.send(true);
        let store = Arc::clone(&self.store);
        let lesson_id = self.lesson_id;
        let user_id = self.user_id;
        let answers = self.state.answers().clone();
        let done = self.done_tx.clone();
        let mut cancelled = self.cancel.subscribe();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
                // Teardown raced the pre-delay: abort without touching the
                // network.
                if *cancelled.borrow_and_update() {
                    return;
                }
            }
            let result = store.upsert_progress(lesson_id, user_id, &snapshot).await;
            let _ = done.send(WriteDone {
                kind,
                snapshot,
                answers,
                result,
            });
        });
    }

    fn handle_write_done(&mut self, done: WriteDone) {
        let now = Instant::now();
        match done.result {
            Ok(()) => {
                self.memory.record_saved(&done.snapshot, &done.answers, now);
                if done.kind == TriggerKind::Manual {
                    let _ = self.events.send(SyncEvent::ManualSaveSucceeded);
                }
                debug!(kind = ?done.kind, "progress saved");
            }
            Err(err) => {
                self.memory.attempts += 1;
                match done.kind {
                    TriggerKind::Manual => {
                        let _ = self.events.send(SyncEvent::ManualSaveFailed(err.into()));
                    }
                    TriggerKind::Automatic => {
                        warn!(attempts = self.memory.attempts, error = %err, "automatic save failed");
                    }
                }
            }
        }

        let queued = self.executor.complete(
            now,
            self.memory.settle.last_saved_at(),
            self.config.auto_save_min_interval,
        );
        if let Some(kind) = queued {
            // Rebuild from the latest state; the identity guard drops
            // intents a faster write already made stale.
            let candidate = self.state.snapshot(now);
            if change::is_redundant(&candidate, self.memory.last_saved.as_ref()) {
                debug!("queued save dropped: identical to last saved snapshot");
            } else {
                self.dispatch(candidate, kind);
            }
        }

        if !self.executor.is_saving() {
            let _ = self.saving.send(false);
        }
    }

    /// Cancel all pending work and issue the single best-effort flush.
    fn teardown(&mut self) {
        self.memory.cancelled = true;
        let _ = self.cancel.send(true);
        self.coalescer.clear();

        if self.executor.is_saving() {
            // The in-flight write finishes or fails on its own; no second
            // write is issued behind it.
            return;
        }
        let snapshot = self.state.snapshot(Instant::now());
        let store = Arc::clone(&self.store);
        let lesson_id = self.lesson_id;
        let user_id = self.user_id;
        tokio::spawn(async move {
            // Fire-and-forget: every gate is bypassed and the outcome is
            // swallowed.
            let _ = store.upsert_progress(lesson_id, user_id, &snapshot).await;
        });
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}
