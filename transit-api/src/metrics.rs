use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::state::AppState;

/// Counters exposed on `/metrics`. Each state owns its registry so tests stay isolated.
pub struct Metrics {
    registry: Registry,
    pub bookings_created: IntCounter,
    pub seat_conflicts: IntCounter,
    pub booking_transitions: IntCounterVec,
    pub forecast_fallbacks: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_created =
            IntCounter::new("transit_bookings_created_total", "Bookings successfully created")?;
        let seat_conflicts = IntCounter::new(
            "transit_seat_conflicts_total",
            "Reservation attempts rejected because the seat was taken",
        )?;
        let booking_transitions = IntCounterVec::new(
            Opts::new("transit_booking_transitions_total", "Lifecycle transitions applied"),
            &["transition"],
        )?;
        let forecast_fallbacks = IntCounter::new(
            "transit_forecast_fallbacks_total",
            "Forecast responses replaced by locally generated mock data",
        )?;

        registry.register(Box::new(bookings_created.clone()))?;
        registry.register(Box::new(seat_conflicts.clone()))?;
        registry.register(Box::new(booking_transitions.clone()))?;
        registry.register(Box::new(forecast_fallbacks.clone()))?;

        Ok(Self {
            registry,
            bookings_created,
            seat_conflicts,
            booking_transitions,
            forecast_fallbacks,
        })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
