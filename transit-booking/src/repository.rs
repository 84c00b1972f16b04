use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::Booking;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Seat is already held by an active booking")]
    SeatTaken,

    #[error("Duplicate value for unique key {0}")]
    DuplicateKey(String),

    #[error("Booking {0} was changed by another writer")]
    StaleWrite(Uuid),

    #[error("Booking {0} not found")]
    NotFound(Uuid),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Persistence for bookings.
///
/// Implementations must enforce seat uniqueness themselves: at most one booking in
/// `pending` or `confirmed` per (schedule, travel date, seat label). A pre-check by the
/// caller is not enough once several processes write concurrently.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Atomically inserts `booking`, failing with [`RepositoryError::SeatTaken`] when its seat is held.
    async fn insert(&self, booking: &Booking) -> Result<(), RepositoryError>;

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, RepositoryError>;

    /// Persists `booking` only if the stored version still equals `read_version`,
    /// failing with [`RepositoryError::StaleWrite`] otherwise.
    async fn update(&self, booking: &Booking, read_version: i64) -> Result<(), RepositoryError>;

    async fn is_seat_taken(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
        seat_label: &str,
    ) -> Result<bool, RepositoryError>;

    /// Labels of seats held on a trip occurrence.
    async fn taken_seats(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> Result<Vec<String>, RepositoryError>;

    /// A user's bookings, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>, RepositoryError>;
}
