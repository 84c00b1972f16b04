use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use transit_core::{Actor, CatalogRepository, Clock, NotificationSink};
use transit_shared::{BookingEvent, BookingEventKind};
use uuid::Uuid;

use crate::error::BookingError;
use crate::ledger::{BookingDraft, LedgerRules, SeatLedger};
use crate::models::{Booking, CancelBookingRequest, CreateBookingRequest, SeatMap};
use crate::repository::BookingRepository;
use crate::seat::all_seats;

/// Orchestrates seat reservation and lifecycle transitions for bookings.
pub struct BookingService {
    ledger: SeatLedger,
    repo: Arc<dyn BookingRepository>,
    catalog: Arc<dyn CatalogRepository>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        repo: Arc<dyn BookingRepository>,
        catalog: Arc<dyn CatalogRepository>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        rules: LedgerRules,
    ) -> Self {
        Self {
            ledger: SeatLedger::new(repo.clone(), rules),
            repo,
            catalog,
            notifier,
            clock,
        }
    }

    /// Reserve a seat. The new booking is `pending` until confirmed.
    #[instrument(skip(self, req), fields(user = %actor.user_id, schedule = %req.schedule_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        req: CreateBookingRequest,
    ) -> Result<Booking, BookingError> {
        let errors = req.field_errors();
        if !errors.is_empty() {
            return Err(BookingError::Validation(errors));
        }

        // 1. Resolve catalog cross-references
        self.catalog
            .get_route(req.route_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| BookingError::NotFound(format!("Route {}", req.route_id)))?;

        let schedule = self
            .catalog
            .get_schedule(req.schedule_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| BookingError::NotFound(format!("Schedule {}", req.schedule_id)))?;

        if schedule.route_id != req.route_id {
            return Err(BookingError::NotFound(format!(
                "Schedule {} on route {}",
                req.schedule_id, req.route_id
            )));
        }

        let vehicle = self
            .catalog
            .get_vehicle(schedule.vehicle_id)
            .await?
            .filter(|v| v.is_active)
            .ok_or_else(|| BookingError::NotFound(format!("Vehicle {}", schedule.vehicle_id)))?;

        // 2. Atomic check-and-create in the ledger
        let draft = BookingDraft {
            user_id: actor.user_id.clone(),
            route_id: req.route_id,
            schedule_id: schedule.id,
            vehicle_id: vehicle.id,
            travel_date: req.travel_date,
            seat_label: req.seat_label,
            fare: req.fare,
            passenger_details: req.passenger_details,
            special_requests: req.special_requests,
            payment_method: req.payment_method,
        };
        let booking = self.ledger.reserve(draft, vehicle.capacity, self.clock.now()).await?;

        // 3. Notify listeners
        self.notify(BookingEventKind::Created, &booking);

        Ok(booking)
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.load(id).await?;
        Self::authorize(actor, &booking)?;
        Ok(booking)
    }

    pub async fn list_for_actor(&self, actor: &Actor) -> Result<Vec<Booking>, BookingError> {
        Ok(self.repo.list_for_user(&actor.user_id).await?)
    }

    #[instrument(skip(self, req), fields(user = %actor.user_id))]
    pub async fn cancel(
        &self,
        actor: &Actor,
        id: Uuid,
        req: CancelBookingRequest,
    ) -> Result<Booking, BookingError> {
        let errors = req.field_errors();
        if !errors.is_empty() {
            return Err(BookingError::Validation(errors));
        }

        let cancelled_by = actor.user_id.clone();
        self.transition(actor, id, BookingEventKind::Cancelled, move |booking, now| {
            booking.cancel(req.reason, &cancelled_by, now)
        })
        .await
    }

    #[instrument(skip(self), fields(user = %actor.user_id))]
    pub async fn confirm(&self, actor: &Actor, id: Uuid) -> Result<Booking, BookingError> {
        self.transition(actor, id, BookingEventKind::Confirmed, |booking, now| {
            booking.confirm(now)
        })
        .await
    }

    #[instrument(skip(self), fields(user = %actor.user_id))]
    pub async fn check_in(&self, actor: &Actor, id: Uuid) -> Result<Booking, BookingError> {
        self.transition(actor, id, BookingEventKind::CheckedIn, |booking, now| {
            booking.check_in(now)
        })
        .await
    }

    #[instrument(skip(self), fields(user = %actor.user_id))]
    pub async fn complete(&self, actor: &Actor, id: Uuid) -> Result<Booking, BookingError> {
        self.transition(actor, id, BookingEventKind::Completed, |booking, now| {
            booking.complete(now)
        })
        .await
    }

    /// Administrators only.
    #[instrument(skip(self), fields(user = %actor.user_id))]
    pub async fn mark_no_show(&self, actor: &Actor, id: Uuid) -> Result<Booking, BookingError> {
        if !actor.is_admin() {
            return Err(BookingError::Forbidden(
                "only administrators can record no-shows".to_string(),
            ));
        }
        self.transition(actor, id, BookingEventKind::NoShow, |booking, now| {
            booking.mark_no_show(now)
        })
        .await
    }

    pub async fn is_seat_taken(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
        seat_label: &str,
    ) -> Result<bool, BookingError> {
        self.ledger.is_seat_taken(schedule_id, travel_date, seat_label).await
    }

    /// Taken and available seats for one trip occurrence.
    pub async fn seat_map(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> Result<SeatMap, BookingError> {
        let schedule = self
            .catalog
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Schedule {}", schedule_id)))?;
        let vehicle = self
            .catalog
            .get_vehicle(schedule.vehicle_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Vehicle {}", schedule.vehicle_id)))?;

        let taken = self.repo.taken_seats(schedule_id, travel_date).await?;
        let available = all_seats(vehicle.capacity)
            .filter(|label| !taken.contains(label))
            .collect();

        Ok(SeatMap {
            schedule_id,
            travel_date,
            capacity: vehicle.capacity,
            taken,
            available,
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn transition<F>(
        &self,
        actor: &Actor,
        id: Uuid,
        kind: BookingEventKind,
        apply: F,
    ) -> Result<Booking, BookingError>
    where
        F: FnOnce(&mut Booking, DateTime<Utc>) -> Result<(), BookingError>,
    {
        let mut booking = self.load(id).await?;
        Self::authorize(actor, &booking)?;

        let from = booking.status;
        apply(&mut booking, self.clock.now())?;
        let read_version = booking.bump_version();
        self.repo.update(&booking, read_version).await?;

        info!(
            "Booking {} {} -> {} ({:?})",
            booking.reference, from, booking.status, kind
        );
        self.notify(kind, &booking);

        Ok(booking)
    }

    async fn load(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Booking {}", id)))
    }

    fn authorize(actor: &Actor, booking: &Booking) -> Result<(), BookingError> {
        if actor.may_act_for(&booking.user_id) {
            Ok(())
        } else {
            Err(BookingError::Forbidden(
                "booking belongs to another user".to_string(),
            ))
        }
    }

    /// Fire-and-forget: delivery runs on its own task and failures are only logged.
    fn notify(&self, kind: BookingEventKind, booking: &Booking) {
        let event = BookingEvent {
            kind,
            booking_id: booking.id,
            booking_reference: booking.reference.clone(),
            route_id: booking.route_id,
            schedule_id: booking.schedule_id,
            travel_date: booking.travel_date,
            seat_label: booking.seat_label.clone(),
            occurred_at: self.clock.now().timestamp(),
        };
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            if let Err(e) = notifier.publish(&event).await {
                warn!("Failed to deliver {} for {}: {}", event.kind.topic(), event.booking_reference, e);
            }
        });
    }
}
