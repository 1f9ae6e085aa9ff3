//! Outbox queries on top of any `Repository<OutboxEvent>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tessera_core::criteria::{Criteria, FilterOperator, Order};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use tracing::debug;
use uuid::Uuid;

use crate::event::{OutboxEvent, OutboxState};

/// Relay and housekeeping operations, provided for every repository of
/// [`OutboxEvent`]s.
#[async_trait]
pub trait OutboxRepository: Repository<OutboxEvent> {
    /// Up to `limit` pending rows, oldest first (`createdAt`, then `id`).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query fails.
    async fn find_pending(&self, limit: u64) -> Result<Vec<OutboxEvent>, DomainError> {
        let criteria = Criteria::builder()
            .filter_by("state", FilterOperator::Equal, OutboxState::Pending.as_str())
            .order(Order::asc("createdAt"))
            .offset(limit, 0)
            .build()?;
        Ok(self.find_by_criteria(&criteria).await?.items)
    }

    /// Marks a row dispatched at `at`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the row does not exist, or
    /// `DomainError::Infrastructure` if storage fails.
    async fn mark_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut event = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("OutboxEvent", id))?;
        event.mark_dispatched(at);
        self.save(&event, None).await
    }

    /// Counts a failed publish attempt and returns the updated row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the row does not exist,
    /// `DomainError::InvalidArgument` if it cannot be retried, or
    /// `DomainError::Infrastructure` if storage fails.
    async fn record_failure(&self, id: Uuid) -> Result<OutboxEvent, DomainError> {
        let mut event = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("OutboxEvent", id))?;
        event.record_failure()?;
        self.save(&event, None).await?;
        Ok(event)
    }

    /// Deletes rows dispatched before `cutoff` and returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if storage fails.
    async fn delete_dispatched_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let criteria = Criteria::builder()
            .filter_by("state", FilterOperator::Equal, OutboxState::Dispatched.as_str())
            .filter_by("dispatchedAt", FilterOperator::Lt, cutoff.to_rfc3339())
            .build()?;
        let expired = self.find_by_criteria(&criteria).await?.items;
        for event in &expired {
            self.remove(event.id, None).await?;
        }
        debug!(removed = expired.len(), %cutoff, "deleted dispatched outbox events");
        Ok(expired.len() as u64)
    }
}

impl<R: Repository<OutboxEvent> + ?Sized> OutboxRepository for R {}
