#![forbid(unsafe_code)]

pub mod http;
pub mod repository;

pub use http::{HttpProgressStore, ProgressApiConfig};
pub use repository::{InMemoryProgressStore, ProgressRecord, ProgressStore, StoreError};
