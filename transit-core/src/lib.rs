pub mod catalog;
pub mod clock;
pub mod identity;
pub mod notify;

use serde::{Deserialize, Serialize};

pub use catalog::{CatalogRepository, InMemoryCatalog, Route, Schedule, Vehicle};
pub use clock::{Clock, FixedClock, SystemClock};
pub use identity::{Actor, Role};
pub use notify::{BroadcastSink, FanoutSink, NotificationSink};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Catalog lookup failed: {0}")]
    CatalogError(String),
    #[error("Notification delivery failed: {0}")]
    NotificationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// One field-level validation problem, reported back to the caller as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
