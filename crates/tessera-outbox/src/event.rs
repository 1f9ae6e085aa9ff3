//! The outbox row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::aggregate::{Aggregate, FieldKind, QueryableField};
use tessera_core::clock::Clock;
use tessera_core::error::DomainError;
use tessera_core::event::IntegrationEvent;
use uuid::Uuid;

/// Publish attempts allowed before a row is given up on.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Delivery state of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxState {
    /// Waiting to be published.
    Pending,
    /// Published; `dispatchedAt` is set.
    Dispatched,
    /// Every retry failed; the relay no longer picks it up.
    Exhausted,
}

impl OutboxState {
    /// The serialized name, as used in criteria filters.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::Exhausted => "exhausted",
        }
    }
}

/// An integration event waiting in (or delivered from) the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEvent {
    /// Row identifier; also the idempotency key for consumers.
    pub id: Uuid,
    /// Event name, e.g. `user.created`.
    pub event_name: String,
    /// Broker topic.
    pub topic: String,
    /// Serialized event.
    pub payload: String,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
    /// When the row was published, if it was.
    pub dispatched_at: Option<DateTime<Utc>>,
    /// Failed publish attempts so far.
    pub retry_count: u32,
    /// Failed attempts allowed.
    pub max_retries: u32,
    /// Delivery state.
    pub state: OutboxState,
}

const OUTBOX_FIELDS: &[QueryableField] = &[
    QueryableField::new("state", FieldKind::Text),
    QueryableField::new("topic", FieldKind::Text),
    QueryableField::new("eventName", FieldKind::Text),
    QueryableField::new("createdAt", FieldKind::Timestamp),
    QueryableField::new("dispatchedAt", FieldKind::Timestamp),
    QueryableField::new("retryCount", FieldKind::Number),
];

impl Aggregate for OutboxEvent {
    const COLLECTION: &'static str = "outbox_events";

    fn id(&self) -> Uuid {
        self.id
    }

    fn queryable_fields() -> &'static [QueryableField] {
        OUTBOX_FIELDS
    }
}

impl OutboxEvent {
    /// Creates a pending row.
    #[must_use]
    pub fn new(
        event_name: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<String>,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_name: event_name.into(),
            topic: topic.into(),
            payload: payload.into(),
            created_at: clock.now(),
            dispatched_at: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            state: OutboxState::Pending,
        }
    }

    /// Creates a pending row carrying `event`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the event cannot be
    /// serialized.
    pub fn from_integration_event(
        event: &dyn IntegrationEvent,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        Ok(Self::new(
            event.event_name(),
            event.topic(),
            event.to_payload()?,
            clock,
        ))
    }

    /// Returns `true` once the row has been published.
    #[must_use]
    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }

    /// Returns `true` if the relay may still attempt to publish the row.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.state == OutboxState::Pending && self.retry_count < self.max_retries
    }

    /// Marks the row published at `at`. A row already dispatched keeps its
    /// original dispatch time.
    pub fn mark_dispatched(&mut self, at: DateTime<Utc>) {
        if self.is_dispatched() {
            return;
        }
        self.dispatched_at = Some(at);
        self.state = OutboxState::Dispatched;
    }

    /// Counts a failed publish attempt. The row becomes
    /// [`OutboxState::Exhausted`] when it reaches `max_retries`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the row is dispatched or
    /// has no retries left.
    pub fn record_failure(&mut self) -> Result<(), DomainError> {
        if !self.can_retry() {
            return Err(DomainError::invalid(format!(
                "outbox event {} cannot be retried ({} of {} attempts, {})",
                self.id,
                self.retry_count,
                self.max_retries,
                self.state.as_str()
            )));
        }
        self.retry_count += 1;
        if self.retry_count >= self.max_retries {
            self.state = OutboxState::Exhausted;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;
    use tessera_core::clock::SystemClock;

    use super::*;

    fn pending() -> OutboxEvent {
        OutboxEvent::new("user.created", "users", "{}", &SystemClock)
    }

    #[test]
    fn test_new_event_is_pending_with_default_retries() {
        let event = pending();

        assert_eq!(event.state, OutboxState::Pending);
        assert_eq!(event.retry_count, 0);
        assert_eq!(event.max_retries, DEFAULT_MAX_RETRIES);
        assert!(!event.is_dispatched());
        assert!(event.can_retry());
    }

    #[test]
    fn test_mark_dispatched_sets_time_once() {
        let first = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 1, 16, 10, 0, 0).unwrap();
        let mut event = pending();

        event.mark_dispatched(first);
        event.mark_dispatched(second);

        assert_eq!(event.dispatched_at, Some(first));
        assert_eq!(event.state, OutboxState::Dispatched);
        assert!(!event.can_retry());
    }

    #[test]
    fn test_record_failure_exhausts_at_max_retries() {
        let mut event = pending();
        event.max_retries = 2;

        event.record_failure().unwrap();
        assert_eq!(event.state, OutboxState::Pending);
        event.record_failure().unwrap();

        assert_eq!(event.retry_count, 2);
        assert_eq!(event.state, OutboxState::Exhausted);
        assert!(matches!(
            event.record_failure(),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_record_failure_rejects_dispatched_event() {
        let mut event = pending();
        event.mark_dispatched(Utc::now());

        assert!(event.record_failure().is_err());
        assert_eq!(event.retry_count, 0);
    }

    #[test]
    fn test_serialized_form_uses_camel_case_and_lowercase_state() {
        let event = pending();

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["eventName"], json!("user.created"));
        assert_eq!(value["state"], json!("pending"));
        assert_eq!(value["dispatchedAt"], json!(null));
        assert_eq!(value["maxRetries"], json!(5));
    }
}
