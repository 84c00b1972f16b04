use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use transit_shared::BookingEvent;

use crate::{CoreError, CoreResult};

/// Receiver of booking lifecycle events. Delivery is best-effort; callers never
/// fail a booking operation because a sink did.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> CoreResult<()>;
}

/// In-process fan-out to live listeners (dashboards, socket gateways).
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<BookingEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn publish(&self, event: &BookingEvent) -> CoreResult<()> {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// Publishes to every configured sink, reporting the first failure after trying all of them.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    async fn publish(&self, event: &BookingEvent) -> CoreResult<()> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event).await {
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::NotificationError(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use transit_shared::BookingEventKind;
    use uuid::Uuid;

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn publish(&self, _event: &BookingEvent) -> CoreResult<()> {
            Err(CoreError::NotificationError("broker down".to_string()))
        }
    }

    fn event() -> BookingEvent {
        BookingEvent {
            kind: BookingEventKind::Created,
            booking_id: Uuid::new_v4(),
            booking_reference: "ST1".to_string(),
            route_id: Uuid::new_v4(),
            schedule_id: Uuid::new_v4(),
            travel_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            seat_label: "Seat 1".to_string(),
            occurred_at: 0,
        }
    }

    #[tokio::test]
    async fn test_fanout_still_reaches_healthy_sinks() {
        let broadcast = BroadcastSink::new(8);
        let mut rx = broadcast.subscribe();
        let fanout = FanoutSink::new()
            .with(Arc::new(FailingSink))
            .with(Arc::new(broadcast.clone()));

        let result = fanout.publish(&event()).await;

        assert!(result.is_err());
        assert_eq!(rx.recv().await.unwrap().seat_label, "Seat 1");
    }
}
