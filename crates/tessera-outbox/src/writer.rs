//! Records integration events in the outbox inside a unit of work.

use std::sync::Arc;

use tessera_core::clock::Clock;
use tessera_core::error::DomainError;
use tessera_core::event::IntegrationEvent;
use tessera_core::repository::Repository;
use tracing::debug;

use crate::event::OutboxEvent;

/// Writes [`OutboxEvent`] rows through a repository.
pub struct OutboxWriter<R> {
    repository: R,
    clock: Arc<dyn Clock>,
}

impl<R> std::fmt::Debug for OutboxWriter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxWriter").finish_non_exhaustive()
    }
}

impl<R: Repository<OutboxEvent>> OutboxWriter<R> {
    /// Creates a writer stamping rows with `clock`.
    #[must_use]
    pub fn new(repository: R, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// The underlying repository.
    #[must_use]
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Saves `event` as a pending row, inside `context` when given.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the event cannot be
    /// serialized or the context is completed, or
    /// `DomainError::Infrastructure` if the save fails.
    pub async fn record(
        &self,
        event: &dyn IntegrationEvent,
        context: Option<&R::Context>,
    ) -> Result<OutboxEvent, DomainError> {
        let row = OutboxEvent::from_integration_event(event, self.clock.as_ref())?;
        self.repository.save(&row, context).await?;
        debug!(
            outbox_id = %row.id,
            event_name = %row.event_name,
            topic = %row.topic,
            "recorded integration event in outbox"
        );
        Ok(row)
    }
}
