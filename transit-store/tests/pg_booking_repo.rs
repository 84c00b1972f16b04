//! Runs against a real database when `TEST_DATABASE_URL` is set; skipped otherwise.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use transit_booking::{Booking, BookingRepository, BookingStatus, PaymentStatus, RepositoryError};
use transit_core::CatalogRepository;
use transit_store::{DbClient, PgBookingRepository, PgCatalogRepository};
use uuid::Uuid;

async fn connect() -> Option<DbClient> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let db = DbClient::new(&url, 5).await.ok()?;
    db.migrate().await.ok()?;
    Some(db)
}

async fn seed_trip(db: &DbClient) -> (Uuid, Uuid, Uuid) {
    let (route, vehicle, schedule) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    sqlx::query("INSERT INTO routes (id, name, origin, destination) VALUES ($1, 'Test', 'A', 'B')")
        .bind(route)
        .execute(&db.pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO vehicles (id, registration, capacity) VALUES ($1, $2, 40)")
        .bind(vehicle)
        .bind(format!("T-{}", vehicle.simple()))
        .execute(&db.pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO schedules (id, route_id, vehicle_id, departure_time) VALUES ($1, $2, $3, $4)")
        .bind(schedule)
        .bind(route)
        .bind(vehicle)
        .bind(NaiveTime::from_hms_opt(7, 30, 0).unwrap())
        .execute(&db.pool)
        .await
        .unwrap();
    (route, schedule, vehicle)
}

fn booking(route: Uuid, schedule: Uuid, vehicle: Uuid, seat: &str) -> Booking {
    let now = Utc::now();
    Booking {
        id: Uuid::new_v4(),
        reference: format!("ST{}", Uuid::new_v4().simple()).to_uppercase(),
        check_in_token: Uuid::new_v4().simple().to_string(),
        user_id: "pg-user".to_string(),
        route_id: route,
        schedule_id: schedule,
        vehicle_id: vehicle,
        travel_date: NaiveDate::from_ymd_opt(2030, 1, 15).unwrap(),
        seat_label: seat.to_string(),
        fare: 12.0,
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
async fn test_partial_index_enforces_seat_uniqueness() {
    let Some(db) = connect().await else {
        return;
    };
    let (route, schedule, vehicle) = seed_trip(&db).await;
    let repo = Arc::new(PgBookingRepository::new(db.pool.clone()));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let repo = repo.clone();
            let b = booking(route, schedule, vehicle, "Seat 3");
            tokio::spawn(async move { repo.insert(&b).await })
        })
        .collect();

    let mut wins = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => wins += 1,
            Err(RepositoryError::SeatTaken) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(wins, 1);

    let date = NaiveDate::from_ymd_opt(2030, 1, 15).unwrap();
    assert!(repo.is_seat_taken(schedule, date, "Seat 3").await.unwrap());
    assert_eq!(repo.taken_seats(schedule, date).await.unwrap(), vec!["Seat 3"]);
}

#[tokio::test]
async fn test_conditional_update_and_seat_release() {
    let Some(db) = connect().await else {
        return;
    };
    let (route, schedule, vehicle) = seed_trip(&db).await;
    let repo = PgBookingRepository::new(db.pool.clone());

    let mut b = booking(route, schedule, vehicle, "Seat 9");
    repo.insert(&b).await.unwrap();
    // Loaded before the cancellation below
    let mut stale = repo.get(b.id).await.unwrap().unwrap();

    b.cancel(None, "pg-user", Utc::now()).unwrap();
    let read = b.bump_version();
    repo.update(&b, read).await.unwrap();

    // A second writer holding the pending revision loses
    stale.confirm(Utc::now()).unwrap();
    let read = stale.bump_version();
    assert!(matches!(
        repo.update(&stale, read).await,
        Err(RepositoryError::StaleWrite(_))
    ));

    // The seat is free again
    repo.insert(&booking(route, schedule, vehicle, "Seat 9")).await.unwrap();

    let stored = repo.get(b.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert_eq!(stored.version, 2);

    // Check-in keeps the status, so only the version tells the writers apart
    let mut confirmed = booking(route, schedule, vehicle, "Seat 10");
    repo.insert(&confirmed).await.unwrap();
    confirmed.confirm(Utc::now()).unwrap();
    let read = confirmed.bump_version();
    repo.update(&confirmed, read).await.unwrap();

    let mut first = repo.get(confirmed.id).await.unwrap().unwrap();
    let mut second = first.clone();
    let early = Utc.with_ymd_and_hms(2030, 1, 15, 8, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2030, 1, 15, 8, 5, 0).unwrap();

    first.check_in(early).unwrap();
    let read = first.bump_version();
    repo.update(&first, read).await.unwrap();

    second.check_in(late).unwrap();
    let read = second.bump_version();
    assert!(matches!(
        repo.update(&second, read).await,
        Err(RepositoryError::StaleWrite(_))
    ));
    let stored = repo.get(confirmed.id).await.unwrap().unwrap();
    assert_eq!(stored.check_in_time, Some(early));

    let catalog = PgCatalogRepository::new(db.pool.clone());
    let vehicle = catalog.get_vehicle(vehicle).await.unwrap().unwrap();
    assert_eq!(vehicle.capacity, 40);
}
