use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use transit_core::FieldError;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{Booking, BookingStatus, PassengerDetails, PaymentStatus};
use crate::reference::{generate_check_in_token, generate_reference};
use crate::repository::{BookingRepository, RepositoryError};
use crate::seat::{canonical_seat, seat_label, seat_number};

/// Fresh identifiers are generated this many times when a reference collides.
const MAX_ALLOCATION_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct LedgerRules {
    /// How far ahead a seat may be booked.
    pub max_advance_days: i64,
}

impl Default for LedgerRules {
    fn default() -> Self {
        Self { max_advance_days: 365 }
    }
}

/// Everything needed to reserve a seat, after catalog cross-references were resolved.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub user_id: String,
    pub route_id: Uuid,
    pub schedule_id: Uuid,
    pub vehicle_id: Uuid,
    pub travel_date: NaiveDate,
    pub seat_label: String,
    pub fare: f64,
    pub passenger_details: Option<PassengerDetails>,
    pub special_requests: Option<String>,
    pub payment_method: Option<String>,
}

impl BookingDraft {
    fn into_booking(self, seat_label: String, now: DateTime<Utc>) -> Booking {
        let reference = generate_reference(now, &mut rand::thread_rng());

        Booking {
            id: Uuid::new_v4(),
            reference,
            check_in_token: generate_check_in_token(),
            user_id: self.user_id,
            route_id: self.route_id,
            schedule_id: self.schedule_id,
            vehicle_id: self.vehicle_id,
            travel_date: self.travel_date,
            seat_label,
            fare: self.fare,
            passenger_details: self.passenger_details,
            special_requests: self.special_requests,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: self.payment_method,
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
}

/// Source of truth for which seats are taken on a (schedule, travel date).
pub struct SeatLedger {
    repo: Arc<dyn BookingRepository>,
    rules: LedgerRules,
}

impl SeatLedger {
    pub fn new(repo: Arc<dyn BookingRepository>, rules: LedgerRules) -> Self {
        Self { repo, rules }
    }

    pub async fn is_seat_taken(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
        raw_label: &str,
    ) -> Result<bool, BookingError> {
        let number = seat_number(raw_label).ok_or_else(|| {
            BookingError::single_field("seat_label", format!("'{}' is not a valid seat label", raw_label))
        })?;

        Ok(self
            .repo
            .is_seat_taken(schedule_id, travel_date, &seat_label(number))
            .await?)
    }

    /// Validates the draft and atomically creates one `pending` booking for the seat.
    pub async fn reserve(
        &self,
        draft: BookingDraft,
        capacity: u32,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let today = now.date_naive();
        let mut errors = Vec::new();

        if draft.travel_date < today {
            errors.push(FieldError::new("travel_date", "travel date cannot be in the past"));
        } else if (draft.travel_date - today).num_days() > self.rules.max_advance_days {
            errors.push(FieldError::new(
                "travel_date",
                format!(
                    "travel date must be within {} days",
                    self.rules.max_advance_days
                ),
            ));
        }

        let seat = canonical_seat(&draft.seat_label, capacity);
        if let Err(e) = &seat {
            errors.push(e.clone());
        }
        if !errors.is_empty() {
            return Err(BookingError::Validation(errors));
        }
        let seat = seat.map_err(|e| BookingError::Validation(vec![e]))?;

        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let booking = draft.clone().into_booking(seat.clone(), now);

            match self.repo.insert(&booking).await {
                Ok(()) => {
                    info!(
                        "Seat reserved: {} on schedule {} for {} ({})",
                        booking.seat_label, booking.schedule_id, booking.travel_date, booking.reference
                    );
                    return Ok(booking);
                }
                Err(RepositoryError::SeatTaken) => {
                    return Err(BookingError::SeatOccupied { seat_label: seat });
                }
                Err(RepositoryError::DuplicateKey(key)) => {
                    warn!("Identifier collision on {} (attempt {}), regenerating", key, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BookingError::Storage(
            "could not allocate unique booking identifiers".to_string(),
        ))
    }
}
