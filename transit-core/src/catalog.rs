use async_trait::async_trait;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::CoreResult;

// ============================================================================
// Catalog Records
// ============================================================================
//
// Routes, schedules and vehicles are administered elsewhere; the booking core
// only reads them. Deactivated records stay in storage (`is_active = false`).

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub id: Uuid,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub id: Uuid,
    pub registration: String,
    pub capacity: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: Uuid,
    pub route_id: Uuid,
    pub vehicle_id: Uuid,
    pub departure_time: NaiveTime,
    pub is_active: bool,
}

/// Read access to the route/schedule/vehicle catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_route(&self, id: Uuid) -> CoreResult<Option<Route>>;

    async fn get_schedule(&self, id: Uuid) -> CoreResult<Option<Schedule>>;

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<Vehicle>>;
}

/// In-memory catalog for development mode and tests.
#[derive(Default)]
pub struct InMemoryCatalog {
    routes: RwLock<HashMap<Uuid, Route>>,
    schedules: RwLock<HashMap<Uuid, Schedule>>,
    vehicles: RwLock<HashMap<Uuid, Vehicle>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_route(&self, route: Route) {
        self.routes.write().await.insert(route.id, route);
    }

    pub async fn put_schedule(&self, schedule: Schedule) {
        self.schedules.write().await.insert(schedule.id, schedule);
    }

    pub async fn put_vehicle(&self, vehicle: Vehicle) {
        self.vehicles.write().await.insert(vehicle.id, vehicle);
    }

    /// Convenience for wiring one route served by one vehicle; returns `(route, schedule, vehicle)`.
    pub async fn seed_trip(&self, route_name: &str, capacity: u32) -> (Route, Schedule, Vehicle) {
        let route = Route {
            id: Uuid::new_v4(),
            name: route_name.to_string(),
            origin: "Origin".to_string(),
            destination: "Destination".to_string(),
            is_active: true,
        };
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            registration: format!("BUS-{}", capacity),
            capacity,
            is_active: true,
        };
        let schedule = Schedule {
            id: Uuid::new_v4(),
            route_id: route.id,
            vehicle_id: vehicle.id,
            departure_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            is_active: true,
        };

        self.put_route(route.clone()).await;
        self.put_vehicle(vehicle.clone()).await;
        self.put_schedule(schedule.clone()).await;

        (route, schedule, vehicle)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn get_route(&self, id: Uuid) -> CoreResult<Option<Route>> {
        Ok(self.routes.read().await.get(&id).cloned())
    }

    async fn get_schedule(&self, id: Uuid) -> CoreResult<Option<Schedule>> {
        Ok(self.schedules.read().await.get(&id).cloned())
    }

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<Vehicle>> {
        Ok(self.vehicles.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_trip_links_records() {
        let catalog = InMemoryCatalog::new();
        let (route, schedule, vehicle) = catalog.seed_trip("Harbor - Old Town", 40).await;

        assert_eq!(schedule.route_id, route.id);
        assert_eq!(schedule.vehicle_id, vehicle.id);
        assert_eq!(catalog.get_vehicle(vehicle.id).await.unwrap().unwrap().capacity, 40);
        assert!(catalog.get_route(Uuid::new_v4()).await.unwrap().is_none());
    }
}
