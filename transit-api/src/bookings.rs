use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use transit_booking::{Booking, BookingError, CancelBookingRequest, CreateBookingRequest, SeatMap};
use transit_core::Actor;
use uuid::Uuid;

use crate::error::{AppError, AppJson, AppPath, AppQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
        .route("/v1/bookings/{id}/check-in", post(check_in_booking))
        .route("/v1/bookings/{id}/complete", post(complete_booking))
        .route("/v1/bookings/{id}/no-show", post(mark_no_show))
        .route("/v1/schedules/{id}/seats", get(seat_map))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(req): AppJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    match state.bookings.create(&actor, req).await {
        Ok(booking) => {
            state.metrics.bookings_created.inc();
            info!("Booking created: {} ({})", booking.reference, booking.seat_label);
            Ok((StatusCode::CREATED, Json(booking)))
        }
        Err(err) => {
            if matches!(err, BookingError::SeatOccupied { .. }) {
                state.metrics.seat_conflicts.inc();
            }
            Err(err.into())
        }
    }
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_for_actor(&actor).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(&actor, id).await?))
}

/// The body is optional: an empty body cancels without a reason.
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppPath(id): AppPath<Uuid>,
    body: Bytes,
) -> Result<Json<Booking>, AppError> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        CancelBookingRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("Invalid cancel request: {}", e)))?
    };

    let booking = state.bookings.cancel(&actor, id, req).await?;
    state.metrics.booking_transitions.with_label_values(&["cancel"]).inc();
    Ok(Json(booking))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.confirm(&actor, id).await?;
    state.metrics.booking_transitions.with_label_values(&["confirm"]).inc();
    Ok(Json(booking))
}

async fn check_in_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.check_in(&actor, id).await?;
    state.metrics.booking_transitions.with_label_values(&["check_in"]).inc();
    Ok(Json(booking))
}

async fn complete_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.complete(&actor, id).await?;
    state.metrics.booking_transitions.with_label_values(&["complete"]).inc();
    Ok(Json(booking))
}

async fn mark_no_show(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.mark_no_show(&actor, id).await?;
    state.metrics.booking_transitions.with_label_values(&["no_show"]).inc();
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
struct SeatQuery {
    date: NaiveDate,
}

async fn seat_map(
    State(state): State<AppState>,
    AppPath(schedule_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<SeatQuery>,
) -> Result<Json<SeatMap>, AppError> {
    Ok(Json(state.bookings.seat_map(schedule_id, query.date).await?))
}
