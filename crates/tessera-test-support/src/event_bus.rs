//! Test domain event buses.

use std::sync::Mutex;

use async_trait::async_trait;
use tessera_core::error::DomainError;
use tessera_core::event::{DomainEvent, DomainEventBus};
use uuid::Uuid;

/// A bus that records the type and aggregate of every published event.
#[derive(Debug, Default)]
pub struct RecordingEventBus {
    published: Mutex<Vec<(&'static str, Uuid)>>,
}

impl RecordingEventBus {
    /// Creates an empty recording bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all published `(event_type, aggregate_id)`
    /// pairs.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<(&'static str, Uuid)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl DomainEventBus for RecordingEventBus {
    async fn publish(&self, event: &dyn DomainEvent) -> Result<(), DomainError> {
        self.published
            .lock()
            .unwrap()
            .push((event.event_type(), event.aggregate_id()));
        Ok(())
    }
}

/// A bus whose every publish fails with an infrastructure error.
#[derive(Debug, Default)]
pub struct FailingEventBus;

#[async_trait]
impl DomainEventBus for FailingEventBus {
    async fn publish(&self, event: &dyn DomainEvent) -> Result<(), DomainError> {
        Err(DomainError::infrastructure(
            "publish_domain_event",
            event.event_type(),
            "event bus unavailable",
        ))
    }
}
