//! Appointment lifecycle: the status state machine, booking, slot
//! availability and the completion → medical-record synchronization.
//!
//! Every operation checks, in order: existence → authorization → state →
//! input. Status changes are written with an optimistic version guard and
//! logged to `appointment_events` in the same transaction.

pub mod booking;
pub mod records;
pub mod service;
pub mod slots;
pub mod transitions;

pub use booking::*;
pub use records::*;
pub use service::*;
pub use slots::*;
pub use transitions::*;

use crate::db::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Lost an optimistic-concurrency race or hit a held slot.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl LifecycleError {
    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        LifecycleError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<DatabaseError> for LifecycleError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConstraintViolation(msg) => LifecycleError::Conflict(msg),
            DatabaseError::NotFound { entity_type, id } => LifecycleError::NotFound {
                entity: entity_type,
                id,
            },
            other => LifecycleError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from_write(err).into()
    }
}
