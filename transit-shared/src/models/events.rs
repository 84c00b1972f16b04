use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    Confirmed,
    Cancelled,
    CheckedIn,
    Completed,
    NoShow,
}

impl BookingEventKind {
    /// Topic the event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            BookingEventKind::Created => "booking.created",
            BookingEventKind::Confirmed => "booking.confirmed",
            BookingEventKind::Cancelled => "booking.cancelled",
            BookingEventKind::CheckedIn => "booking.checked_in",
            BookingEventKind::Completed => "booking.completed",
            BookingEventKind::NoShow => "booking.no_show",
        }
    }
}

/// Lifecycle notification scoped to a route. Listeners subscribe per `route_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub route_id: Uuid,
    pub schedule_id: Uuid,
    pub travel_date: NaiveDate,
    pub seat_label: String,
    pub occurred_at: i64,
}

impl BookingEvent {
    pub fn partition_key(&self) -> String {
        self.route_id.to_string()
    }
}
