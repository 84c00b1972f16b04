use transit_core::{CoreError, FieldError};
use uuid::Uuid;

use crate::models::BookingStatus;
use crate::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("{seat_label} is already taken on this trip")]
    SeatOccupied { seat_label: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot {action} a booking that is {from}")]
    IllegalTransition {
        from: BookingStatus,
        action: &'static str,
    },

    #[error("Booking {0} was modified concurrently, retry with fresh state")]
    ConcurrentModification(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BookingError {
    /// Stable machine-readable code callers can branch on.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "VALIDATION_FAILED",
            BookingError::SeatOccupied { .. } => "SEAT_OCCUPIED",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::Forbidden(_) => "FORBIDDEN",
            BookingError::IllegalTransition { .. } => "ILLEGAL_STATE_TRANSITION",
            BookingError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            BookingError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn single_field(field: &str, message: impl Into<String>) -> Self {
        BookingError::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<RepositoryError> for BookingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::StaleWrite(id) => BookingError::ConcurrentModification(id),
            RepositoryError::NotFound(id) => BookingError::NotFound(format!("Booking {}", id)),
            other => BookingError::Storage(other.to_string()),
        }
    }
}

impl From<CoreError> for BookingError {
    fn from(err: CoreError) -> Self {
        BookingError::Storage(err.to_string())
    }
}
