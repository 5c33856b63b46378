//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StoreError;

/// Errors surfaced to callers of the sync engine.
///
/// Only manual saves report errors outward; automatic save failures stay
/// internal to the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
