use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use transit_booking::BookingError;
use transit_core::FieldError;
use transit_forecast::ForecastError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError {
        message: String,
        details: Vec<FieldError>,
    },
    NotFoundError(String),
    ConflictError {
        code: &'static str,
        message: String,
    },
    InternalServerError(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message, details) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg, None),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            AppError::ValidationError { message, details } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                message,
                (!details.is_empty()).then_some(details),
            ),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::ConflictError { code, message } => (StatusCode::CONFLICT, code, message, None),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal Server Error".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": error_message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = json!(details);
        }

        (status, Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let code = err.code();
        match err {
            BookingError::Validation(details) => AppError::ValidationError {
                message: "Validation failed".to_string(),
                details,
            },
            BookingError::NotFound(what) => AppError::NotFoundError(format!("{} not found", what)),
            BookingError::Forbidden(msg) => AppError::AuthorizationError(msg),
            BookingError::SeatOccupied { .. }
            | BookingError::IllegalTransition { .. }
            | BookingError::ConcurrentModification(_) => AppError::ConflictError {
                code,
                message: err.to_string(),
            },
            BookingError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::InvalidRequest(msg) => AppError::validation(msg),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

/// `Json` whose rejections are reported as 400 validation failures.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T: Serialize> IntoResponse for AppJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use transit_booking::BookingStatus;

    #[test]
    fn test_booking_errors_map_to_status_codes() {
        let cases = [
            (BookingError::single_field("fare", "bad"), StatusCode::BAD_REQUEST),
            (BookingError::SeatOccupied { seat_label: "Seat 1".into() }, StatusCode::CONFLICT),
            (BookingError::NotFound("Booking x".into()), StatusCode::NOT_FOUND),
            (BookingError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (
                BookingError::IllegalTransition { from: BookingStatus::Cancelled, action: "confirm" },
                StatusCode::CONFLICT,
            ),
            (BookingError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
