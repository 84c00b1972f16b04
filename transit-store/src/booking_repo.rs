use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use transit_booking::seat::seat_number;
use transit_booking::{Booking, BookingRepository, PassengerDetails, RepositoryError};
use uuid::Uuid;

/// Partial unique index over active bookings; see migrations.
pub const ACTIVE_SEAT_CONSTRAINT: &str = "bookings_active_seat_key";

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    reference: String,
    check_in_token: String,
    user_id: String,
    route_id: Uuid,
    schedule_id: Uuid,
    vehicle_id: Uuid,
    travel_date: NaiveDate,
    seat_label: String,
    fare: f64,
    passenger_details: Option<Json<PassengerDetails>>,
    special_requests: Option<String>,
    status: String,
    payment_status: String,
    payment_method: Option<String>,
    cancellation_reason: Option<String>,
    cancelled_by: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    check_in_time: Option<DateTime<Utc>>,
    check_out_time: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepositoryError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            reference: row.reference,
            check_in_token: row.check_in_token,
            user_id: row.user_id,
            route_id: row.route_id,
            schedule_id: row.schedule_id,
            vehicle_id: row.vehicle_id,
            travel_date: row.travel_date,
            seat_label: row.seat_label,
            fare: row.fare,
            passenger_details: row.passenger_details.map(|j| j.0),
            special_requests: row.special_requests,
            status: row.status.parse().map_err(RepositoryError::Backend)?,
            payment_status: row.payment_status.parse().map_err(RepositoryError::Backend)?,
            payment_method: row.payment_method,
            cancellation_reason: row.cancellation_reason,
            cancelled_by: row.cancelled_by,
            cancelled_at: row.cancelled_at,
            check_in_time: row.check_in_time,
            check_out_time: row.check_out_time,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_BOOKING: &str = r#"
    SELECT id, reference, check_in_token, user_id, route_id, schedule_id, vehicle_id,
           travel_date, seat_label, fare, passenger_details, special_requests, status,
           payment_status, payment_method, cancellation_reason, cancelled_by, cancelled_at,
           check_in_time, check_out_time, version, created_at, updated_at
    FROM bookings
"#;

/// Unique violations become domain conflicts; everything else is a backend failure.
fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some(ACTIVE_SEAT_CONSTRAINT) => RepositoryError::SeatTaken,
                Some(other) => RepositoryError::DuplicateKey(other.to_string()),
                None => RepositoryError::DuplicateKey("unknown".to_string()),
            };
        }
    }
    RepositoryError::Backend(err.to_string())
}

fn backend(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(err.to_string())
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, booking: &Booking) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, reference, check_in_token, user_id, route_id, schedule_id,
                                  vehicle_id, travel_date, seat_label, fare, passenger_details,
                                  special_requests, status, payment_status, payment_method,
                                  version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.reference)
        .bind(&booking.check_in_token)
        .bind(&booking.user_id)
        .bind(booking.route_id)
        .bind(booking.schedule_id)
        .bind(booking.vehicle_id)
        .bind(booking.travel_date)
        .bind(&booking.seat_label)
        .bind(booking.fare)
        .bind(booking.passenger_details.as_ref().map(Json))
        .bind(&booking.special_requests)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.payment_method)
        .bind(booking.version)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, RepositoryError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE id = $1", SELECT_BOOKING))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(Booking::try_from).transpose()
    }

    async fn update(&self, booking: &Booking, read_version: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, payment_status = $3, cancellation_reason = $4, cancelled_by = $5,
                cancelled_at = $6, check_in_time = $7, check_out_time = $8, updated_at = $9,
                version = $10
            WHERE id = $1 AND version = $11
            "#,
        )
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.cancellation_reason)
        .bind(&booking.cancelled_by)
        .bind(booking.cancelled_at)
        .bind(booking.check_in_time)
        .bind(booking.check_out_time)
        .bind(booking.updated_at)
        .bind(booking.version)
        .bind(read_version)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1)")
            .bind(booking.id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        if exists {
            Err(RepositoryError::StaleWrite(booking.id))
        } else {
            Err(RepositoryError::NotFound(booking.id))
        }
    }

    async fn is_seat_taken(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
        seat_label: &str,
    ) -> Result<bool, RepositoryError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM bookings
                WHERE schedule_id = $1 AND travel_date = $2 AND seat_label = $3
                  AND status IN ('pending', 'confirmed')
            )
            "#,
        )
        .bind(schedule_id)
        .bind(travel_date)
        .bind(seat_label)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)
    }

    async fn taken_seats(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> Result<Vec<String>, RepositoryError> {
        let mut labels: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT seat_label FROM bookings
            WHERE schedule_id = $1 AND travel_date = $2 AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(schedule_id)
        .bind(travel_date)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        labels.sort_by_key(|label| seat_number(label).unwrap_or(u32::MAX));
        Ok(labels)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>, RepositoryError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_BOOKING
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transit_booking::BookingStatus;

    fn row(status: &str) -> BookingRow {
        let now = Utc::now();
        BookingRow {
            id: Uuid::new_v4(),
            reference: "STM7ABCD1234".to_string(),
            check_in_token: Uuid::new_v4().simple().to_string(),
            user_id: "user-1".to_string(),
            route_id: Uuid::new_v4(),
            schedule_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            travel_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            seat_label: "Seat 1".to_string(),
            fare: 20.0,
            passenger_details: Some(Json(PassengerDetails {
                name: Some("Ada".to_string()),
                ..Default::default()
            })),
            special_requests: None,
            status: status.to_string(),
            payment_status: "pending".to_string(),
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

    #[test]
    fn test_row_conversion() {
        let booking = Booking::try_from(row("no_show")).unwrap();
        assert_eq!(booking.status, BookingStatus::NoShow);
        assert_eq!(
            booking.passenger_details.and_then(|p| p.name).as_deref(),
            Some("Ada")
        );
    }

    #[test]
    fn test_unknown_status_is_backend_error() {
        assert!(matches!(
            Booking::try_from(row("teleported")),
            Err(RepositoryError::Backend(_))
        ));
    }

    #[test]
    fn test_non_database_errors_map_to_backend() {
        assert!(matches!(
            map_write_error(sqlx::Error::RowNotFound),
            RepositoryError::Backend(_)
        ));
    }
}
