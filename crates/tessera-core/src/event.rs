//! Domain and integration event abstractions.
//!
//! Domain events are same-process notifications raised by aggregates and
//! delivered through a [`DomainEventBus`]. Integration events cross service
//! boundaries and are only ever written to the outbox.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Trait that all in-process domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for routing and logging).
    fn event_type(&self) -> &'static str;

    /// The aggregate that raised the event.
    fn aggregate_id(&self) -> Uuid;

    /// When the event happened.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Serializes the event payload to JSON.
    fn to_payload(&self) -> serde_json::Value;
}

/// An event announced to other services through the transactional outbox.
pub trait IntegrationEvent: Send + Sync + std::fmt::Debug {
    /// Stable event name, e.g. `user.created`.
    fn event_name(&self) -> &'static str;

    /// Broker topic the event is published on.
    fn topic(&self) -> &'static str;

    /// Serializes the event into the payload stored in the outbox row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the event cannot be
    /// serialized.
    fn to_payload(&self) -> Result<String, DomainError>;
}

/// In-process domain event bus. Distinct from the outbox: nothing published
/// here leaves the process.
#[async_trait]
pub trait DomainEventBus: Send + Sync {
    /// Publishes a single domain event.
    async fn publish(&self, event: &dyn DomainEvent) -> Result<(), DomainError>;

    /// Publishes several domain events in order.
    async fn publish_all(&self, events: &[&dyn DomainEvent]) -> Result<(), DomainError> {
        for event in events {
            self.publish(*event).await?;
        }
        Ok(())
    }
}
