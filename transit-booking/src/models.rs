use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use transit_core::FieldError;
use transit_shared::Masked;
use uuid::Uuid;
use validator::Validate;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// No transition is allowed out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::NoShow
        )
    }

    /// Whether a booking in this status occupies its seat.
    pub fn holds_seat(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            "no_show" => Ok(BookingStatus::NoShow),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

/// Payment status, tracked independently of the booking status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassengerDetails {
    pub name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub id_number: Option<Masked<String>>,
}

const MAX_PASSENGER_NAME_LEN: usize = 100;
const MAX_PASSENGER_AGE: u8 = 120;

impl PassengerDetails {
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            if name.trim().is_empty() || name.chars().count() > MAX_PASSENGER_NAME_LEN {
                errors.push(FieldError::new(
                    "passenger_details.name",
                    format!("name must be 1-{} characters", MAX_PASSENGER_NAME_LEN),
                ));
            }
        }
        if let Some(age) = self.age {
            if age > MAX_PASSENGER_AGE {
                errors.push(FieldError::new(
                    "passenger_details.age",
                    format!("age must be between 0 and {}", MAX_PASSENGER_AGE),
                ));
            }
        }
        if let Some(id) = &self.id_number {
            if id.expose().trim().is_empty() {
                errors.push(FieldError::new("passenger_details.id_number", "id number cannot be blank"));
            }
        }
        errors
    }
}

/// One passenger's reserved seat on one scheduled trip occurrence.
/// Never deleted: cancellation is a status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub reference: String,
    pub check_in_token: String,
    pub user_id: String,
    pub route_id: Uuid,
    pub schedule_id: Uuid,
    pub vehicle_id: Uuid,
    pub travel_date: NaiveDate,
    pub seat_label: String,
    pub fare: f64,
    pub passenger_details: Option<PassengerDetails>,
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    /// Incremented on every persisted change; guards concurrent writers.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub route_id: Uuid,
    pub schedule_id: Uuid,
    pub travel_date: NaiveDate,
    #[validate(length(min = 1, max = 32, message = "seat label is required"))]
    pub seat_label: String,
    #[validate(range(min = 0.0, message = "fare must be a non-negative number"))]
    pub fare: f64,
    pub passenger_details: Option<PassengerDetails>,
    #[validate(length(max = 500, message = "special requests must be at most 500 characters"))]
    pub special_requests: Option<String>,
    pub payment_method: Option<String>,
}

impl CreateBookingRequest {
    /// Field-level problems that can be detected without looking anything up.
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = match self.validate() {
            Ok(()) => Vec::new(),
            Err(e) => flatten_validation_errors(&e),
        };
        if !self.fare.is_finite() {
            errors.push(FieldError::new("fare", "fare must be a non-negative number"));
        }
        if let Some(passenger) = &self.passenger_details {
            errors.extend(passenger.field_errors());
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CancelBookingRequest {
    #[validate(length(max = 500, message = "reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

impl CancelBookingRequest {
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self.validate() {
            Ok(()) => Vec::new(),
            Err(e) => flatten_validation_errors(&e),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatMap {
    pub schedule_id: Uuid,
    pub travel_date: NaiveDate,
    pub capacity: u32,
    pub taken: Vec<String>,
    pub available: Vec<String>,
}

pub(crate) fn flatten_validation_errors(errors: &validator::ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                FieldError::new(field, message)
            })
        })
        .collect();
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_json() -> serde_json::Value {
        serde_json::json!({
            "route_id": Uuid::new_v4(),
            "schedule_id": Uuid::new_v4(),
            "travel_date": "2025-03-10",
            "seat_label": "Seat 1",
            "fare": 20
        })
    }

    #[test]
    fn test_status_round_trip_and_flags() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
            BookingStatus::NoShow,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!(BookingStatus::Pending.holds_seat());
        assert!(!BookingStatus::Cancelled.holds_seat());
        assert!(BookingStatus::NoShow.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!("boarded".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_valid_request_has_no_errors() {
        let req: CreateBookingRequest = serde_json::from_value(request_json()).unwrap();
        assert!(req.field_errors().is_empty());
    }

    #[test]
    fn test_negative_fare_and_long_requests_rejected() {
        let mut json = request_json();
        json["fare"] = serde_json::json!(-1.5);
        json["special_requests"] = serde_json::json!("x".repeat(501));
        json["passenger_details"] = serde_json::json!({ "name": "Ana", "age": 130 });
        let req: CreateBookingRequest = serde_json::from_value(json).unwrap();

        let fields: Vec<String> = req.field_errors().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"fare".to_string()));
        assert!(fields.contains(&"special_requests".to_string()));
        assert!(fields.contains(&"passenger_details.age".to_string()));
    }

    #[test]
    fn test_unknown_gender_is_rejected_at_parse_time() {
        let mut json = request_json();
        json["passenger_details"] = serde_json::json!({ "gender": "robot" });
        assert!(serde_json::from_value::<CreateBookingRequest>(json).is_err());
    }
}
