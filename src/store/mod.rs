//! In-memory stores for cases and feedback.
//!
//! Nothing here is persisted. Cases can be seeded at startup from a
//! directory of JSON files; everything else lives for the process lifetime.

mod cases;
mod feedback;

use thiserror::Error;

pub use cases::{CaseStore, MemoryCaseStore, SharedCaseStore, load_seed_dir};
pub use feedback::{DEFAULT_RATING, FeedbackEntry, FeedbackSink};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Case not found: {0}")]
    NotFound(String),

    #[error("Case already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read seed data: {0}")]
    Seed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
