mod change;
mod coalesce;
mod config;
mod engine;
mod executor;
mod memory;
mod settle;
mod snapshot;

// Public API of the sync subsystem.
pub use change::TriggerKind;
pub use config::SyncConfig;
pub use engine::{ProgressSyncEngine, ProgressSyncHandle, SyncEvent};
pub use snapshot::LessonState;
