use chrono::{DateTime, Utc};

use crate::error::BookingError;
use crate::models::{Booking, BookingStatus, PaymentStatus};

/// Transitions of the booking state machine.
///
/// ```text
/// pending ──confirm──▶ confirmed ──complete──▶ completed
///    │                    │  └──no-show──▶ no_show
///    └──────cancel────────┴──────▶ cancelled
/// ```
///
/// `check_in` stamps a confirmed booking without changing its status.
impl Booking {
    /// Transition: Pending → Confirmed (payment captured)
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        self.require(BookingStatus::Pending, "confirm")?;

        self.status = BookingStatus::Confirmed;
        self.payment_status = PaymentStatus::Paid;
        self.updated_at = now;
        Ok(())
    }

    /// Cancel from any non-terminal status
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        cancelled_by: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if self.status.is_terminal() {
            return Err(BookingError::IllegalTransition {
                from: self.status,
                action: "cancel",
            });
        }

        self.status = BookingStatus::Cancelled;
        if self.payment_status == PaymentStatus::Paid {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.cancellation_reason = reason;
        self.cancelled_by = Some(cancelled_by.to_string());
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Records boarding. Only confirmed bookings, and only once.
    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        self.require(BookingStatus::Confirmed, "check in")?;
        if self.check_in_time.is_some() {
            return Err(BookingError::IllegalTransition {
                from: self.status,
                action: "check in twice",
            });
        }

        self.check_in_time = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Transition: Confirmed → Completed (trip finished)
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        self.require(BookingStatus::Confirmed, "complete")?;

        self.status = BookingStatus::Completed;
        self.check_out_time = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Transition: Confirmed → NoShow
    pub fn mark_no_show(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        self.require(BookingStatus::Confirmed, "mark as no-show")?;

        self.status = BookingStatus::NoShow;
        self.updated_at = now;
        Ok(())
    }

    /// Marks a new revision and returns the version the change was based on.
    pub fn bump_version(&mut self) -> i64 {
        let read = self.version;
        self.version += 1;
        read
    }

    fn require(&self, expected: BookingStatus, action: &'static str) -> Result<(), BookingError> {
        if self.status != expected {
            return Err(BookingError::IllegalTransition {
                from: self.status,
                action,
            });
        }
        Ok(())
    }
}
