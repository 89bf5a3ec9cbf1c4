//! Helmsman - a task-graph engine for tasks, epics, and subtasks.
//!
//! This library provides the core engine behind a work-item tracker:
//! task/epic/subtask CRUD with epic rollups derived from subtasks, a
//! recency-ordered view history, a start-time-ordered schedule that
//! rejects overlapping time windows, and a line-oriented flat-file store
//! that round-trips the whole engine state.
//!
//! HTTP routing and CLI surfaces are callers of this crate, not part of it.

pub mod engine;
pub mod history;
pub mod models;
pub mod schedule;
pub mod storage;

use crate::models::EntityId;

/// Library-level error type for Helmsman operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, EntityId),

    #[error("start time is required for scheduling")]
    MissingStartTime,

    #[error("duration cannot be negative")]
    NegativeDuration,

    #[error("epic not found: {0}")]
    MissingEpic(EntityId),

    #[error("execution time overlaps with task {0}")]
    Overlap(EntityId),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

/// Coarse classification of an [`Error`], for callers (such as an HTTP
/// layer) that map failures to status codes without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Persistence,
}

impl Error {
    /// Classify this error into the three caller-facing kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(..) => ErrorKind::NotFound,
            Error::MissingStartTime
            | Error::NegativeDuration
            | Error::MissingEpic(_)
            | Error::Overlap(_) => ErrorKind::Validation,
            Error::Io(_) | Error::CorruptRecord(_) => ErrorKind::Persistence,
        }
    }
}

/// Result type alias for Helmsman operations.
pub type Result<T> = std::result::Result<T, Error>;
