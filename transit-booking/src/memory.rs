use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Booking;
use crate::repository::{BookingRepository, RepositoryError};
use crate::seat::seat_number;

type SeatKey = (Uuid, NaiveDate, String);

#[derive(Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    // Partial unique index: only pending/confirmed bookings appear here.
    active_seats: HashMap<SeatKey, Uuid>,
    references: HashSet<String>,
    check_in_tokens: HashSet<String>,
}

/// In-memory booking store (development mode and tests).
///
/// Every write runs under one lock, so check-and-insert is atomic per process.
#[derive(Default)]
pub struct InMemoryBookingRepository {
    tables: RwLock<Tables>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.bookings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn seat_key(booking: &Booking) -> SeatKey {
    (booking.schedule_id, booking.travel_date, booking.seat_label.clone())
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;

        let key = seat_key(booking);
        if booking.status.holds_seat() && tables.active_seats.contains_key(&key) {
            return Err(RepositoryError::SeatTaken);
        }
        if tables.bookings.contains_key(&booking.id) {
            return Err(RepositoryError::DuplicateKey("id".to_string()));
        }
        if tables.references.contains(&booking.reference) {
            return Err(RepositoryError::DuplicateKey("reference".to_string()));
        }
        if tables.check_in_tokens.contains(&booking.check_in_token) {
            return Err(RepositoryError::DuplicateKey("check_in_token".to_string()));
        }

        if booking.status.holds_seat() {
            tables.active_seats.insert(key, booking.id);
        }
        tables.references.insert(booking.reference.clone());
        tables.check_in_tokens.insert(booking.check_in_token.clone());
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, RepositoryError> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn update(&self, booking: &Booking, read_version: i64) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;

        let (current_status, current_version) = tables
            .bookings
            .get(&booking.id)
            .map(|b| (b.status, b.version))
            .ok_or(RepositoryError::NotFound(booking.id))?;
        if current_version != read_version {
            return Err(RepositoryError::StaleWrite(booking.id));
        }

        let key = seat_key(booking);
        match (current_status.holds_seat(), booking.status.holds_seat()) {
            (true, false) => {
                tables.active_seats.remove(&key);
            }
            (false, true) => {
                if tables.active_seats.contains_key(&key) {
                    return Err(RepositoryError::SeatTaken);
                }
                tables.active_seats.insert(key, booking.id);
            }
            _ => {}
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn is_seat_taken(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
        seat_label: &str,
    ) -> Result<bool, RepositoryError> {
        let key = (schedule_id, travel_date, seat_label.to_string());
        Ok(self.tables.read().await.active_seats.contains_key(&key))
    }

    async fn taken_seats(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> Result<Vec<String>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut seats: Vec<String> = tables
            .active_seats
            .keys()
            .filter(|(schedule, date, _)| *schedule == schedule_id && *date == travel_date)
            .map(|(_, _, label)| label.clone())
            .collect();
        seats.sort_by_key(|label| seat_number(label).unwrap_or(u32::MAX));
        Ok(seats)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, PaymentStatus};
    use chrono::{TimeZone, Utc};

    fn booking(schedule_id: Uuid, seat: &str, user: &str) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            reference: format!("ST{}", Uuid::new_v4().simple()).to_uppercase(),
            check_in_token: Uuid::new_v4().simple().to_string(),
            user_id: user.to_string(),
            route_id: Uuid::new_v4(),
            schedule_id,
            vehicle_id: Uuid::new_v4(),
            travel_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            seat_label: seat.to_string(),
            fare: 12.5,
            passenger_details: None,
            special_requests: None,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            check_in_time: None,
            check_out_time: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_cancellation_releases_seat() {
        let repo = InMemoryBookingRepository::new();
        let schedule = Uuid::new_v4();
        let mut first = booking(schedule, "Seat 4", "u-1");
        repo.insert(&first).await.unwrap();

        assert!(matches!(
            repo.insert(&booking(schedule, "Seat 4", "u-2")).await,
            Err(RepositoryError::SeatTaken)
        ));

        first.cancel(None, "u-1", Utc::now()).unwrap();
        let read = first.bump_version();
        repo.update(&first, read).await.unwrap();

        assert!(!repo.is_seat_taken(schedule, first.travel_date, "Seat 4").await.unwrap());
        repo.insert(&booking(schedule, "Seat 4", "u-2")).await.unwrap();
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_is_rejected() {
        let repo = InMemoryBookingRepository::new();
        let mut b = booking(Uuid::new_v4(), "Seat 1", "u-1");
        repo.insert(&b).await.unwrap();

        // A second writer read the booking while it was still pending
        let mut stale = b.clone();

        b.confirm(Utc::now()).unwrap();
        let read = b.bump_version();
        repo.update(&b, read).await.unwrap();

        stale.cancel(None, "u-1", Utc::now()).unwrap();
        let read = stale.bump_version();
        assert!(matches!(
            repo.update(&stale, read).await,
            Err(RepositoryError::StaleWrite(_))
        ));
        let stored = repo.get(b.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_concurrent_check_in_keeps_first_write() {
        let repo = InMemoryBookingRepository::new();
        let mut b = booking(Uuid::new_v4(), "Seat 6", "u-1");
        repo.insert(&b).await.unwrap();
        b.confirm(Utc::now()).unwrap();
        let read = b.bump_version();
        repo.update(&b, read).await.unwrap();

        // Both writers load the same confirmed booking; the status never changes
        let mut first = repo.get(b.id).await.unwrap().unwrap();
        let mut second = first.clone();
        let early = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 3, 10, 8, 5, 0).unwrap();

        first.check_in(early).unwrap();
        let read = first.bump_version();
        repo.update(&first, read).await.unwrap();

        second.check_in(late).unwrap();
        let read = second.bump_version();
        assert!(matches!(
            repo.update(&second, read).await,
            Err(RepositoryError::StaleWrite(_))
        ));

        let stored = repo.get(b.id).await.unwrap().unwrap();
        assert_eq!(stored.check_in_time, Some(early));
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_taken_seats_sorted_numerically_and_listing() {
        let repo = InMemoryBookingRepository::new();
        let schedule = Uuid::new_v4();
        for seat in ["Seat 10", "Seat 2", "Seat 1"] {
            repo.insert(&booking(schedule, seat, "u-1")).await.unwrap();
        }
        repo.insert(&booking(Uuid::new_v4(), "Seat 3", "u-2")).await.unwrap();

        let taken = repo
            .taken_seats(schedule, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(taken, vec!["Seat 1", "Seat 2", "Seat 10"]);
        assert_eq!(repo.list_for_user("u-1").await.unwrap().len(), 3);
        assert_eq!(repo.list_for_user("u-3").await.unwrap().len(), 0);
    }
}
