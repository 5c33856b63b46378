#![forbid(unsafe_code)]

pub mod model;

pub use model::{AnswerMap, LessonId, ProgressError, ProgressSnapshot, UserId};
