use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::PgPool;
use transit_core::{CatalogRepository, CoreError, CoreResult, Route, Schedule, Vehicle};
use uuid::Uuid;

/// Read-only view of the route/schedule/vehicle tables. Rows are never deleted,
/// only flagged inactive.
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    name: String,
    origin: String,
    destination: String,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    registration: String,
    capacity: i32,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    route_id: Uuid,
    vehicle_id: Uuid,
    departure_time: NaiveTime,
    is_active: bool,
}

fn catalog_err(err: sqlx::Error) -> CoreError {
    CoreError::CatalogError(err.to_string())
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn get_route(&self, id: Uuid) -> CoreResult<Option<Route>> {
        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT id, name, origin, destination, is_active FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_err)?;

        Ok(row.map(|r| Route {
            id: r.id,
            name: r.name,
            origin: r.origin,
            destination: r.destination,
            is_active: r.is_active,
        }))
    }

    async fn get_schedule(&self, id: Uuid) -> CoreResult<Option<Schedule>> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            "SELECT id, route_id, vehicle_id, departure_time, is_active FROM schedules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_err)?;

        Ok(row.map(|r| Schedule {
            id: r.id,
            route_id: r.route_id,
            vehicle_id: r.vehicle_id,
            departure_time: r.departure_time,
            is_active: r.is_active,
        }))
    }

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(
            "SELECT id, registration, capacity, is_active FROM vehicles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_err)?;

        row.map(|r| {
            let capacity = u32::try_from(r.capacity).map_err(|_| {
                CoreError::CatalogError(format!("vehicle {} has negative capacity", r.id))
            })?;
            Ok(Vehicle {
                id: r.id,
                registration: r.registration,
                capacity,
                is_active: r.is_active,
            })
        })
        .transpose()
    }
}
