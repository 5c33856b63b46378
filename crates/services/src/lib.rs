#![forbid(unsafe_code)]

pub mod error;
pub mod sync;

pub use error::SyncError;

pub use sync::{
    LessonState, ProgressSyncEngine, ProgressSyncHandle, SyncConfig, SyncEvent, TriggerKind,
};
