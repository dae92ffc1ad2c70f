//! Typed errors for the service desk.
//!
//! The database layer speaks `anyhow` with context; `DeskError` names the
//! failures callers need to tell apart (missing ticket, rejected input,
//! poisoned lock) and is what `ApiError` is built from.

use thiserror::Error;
use uuid::Uuid;

use desk_common::ValidationError;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Ticket {id} not found")]
    TicketNotFound { id: Uuid },

    #[error("Service '{name}' already exists")]
    DuplicateService { name: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Issue tracker error: {0}")]
    Tracker(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeskError {
    /// Classify an error coming out of `DbHandle::call`: a `DeskError`
    /// raised inside the closure keeps its variant, anything else is a
    /// database failure.
    pub fn from_db(err: anyhow::Error) -> Self {
        match err.downcast::<DeskError>() {
            Ok(desk) => desk,
            Err(other) => DeskError::Database(other),
        }
    }
}
