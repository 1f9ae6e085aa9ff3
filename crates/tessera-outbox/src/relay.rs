//! Polls the outbox and publishes pending rows.
//!
//! Rows are grouped by topic. Topics are relayed concurrently; rows of one
//! topic are published one at a time in creation order. When a publish
//! fails the rest of that topic waits for the next cycle, so a consumer
//! never sees an event before an older one on the same topic.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tessera_core::clock::Clock;
use tessera_core::error::DomainError;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::event::{OutboxEvent, OutboxState};
use crate::publisher::{MessagePublisher, PublishError};
use crate::repository::OutboxRepository;

/// Relay tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxRelayConfig {
    /// Rows fetched per cycle.
    pub batch_size: u64,
    /// Pause between cycles.
    pub poll_interval: Duration,
    /// Cap on a single publish.
    pub publish_timeout: Duration,
    /// Age after which dispatched rows are deleted.
    pub retention: chrono::TimeDelta,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(1),
            publish_timeout: Duration::from_secs(5),
            retention: chrono::TimeDelta::days(7),
        }
    }
}

/// Outcome of one relay cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Rows published and marked dispatched.
    pub published: usize,
    /// Rows whose publish (or dispatch bookkeeping) failed.
    pub failed: usize,
    /// Rows left for the next cycle behind a failure on their topic.
    pub deferred: usize,
}

impl RelayReport {
    fn merge(self, other: Self) -> Self {
        Self {
            published: self.published + other.published,
            failed: self.failed + other.failed,
            deferred: self.deferred + other.deferred,
        }
    }

    /// Returns `true` if the cycle found nothing to do.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.published == 0 && self.failed == 0 && self.deferred == 0
    }
}

fn group_by_topic(events: Vec<OutboxEvent>) -> Vec<(String, Vec<OutboxEvent>)> {
    let mut groups: Vec<(String, Vec<OutboxEvent>)> = Vec::new();
    for event in events {
        match groups.iter_mut().find(|(topic, _)| *topic == event.topic) {
            Some((_, rows)) => rows.push(event),
            None => groups.push((event.topic.clone(), vec![event])),
        }
    }
    groups
}

/// Moves pending outbox rows to a [`MessagePublisher`].
pub struct OutboxRelay<R, P> {
    repository: R,
    publisher: P,
    clock: Arc<dyn Clock>,
    config: OutboxRelayConfig,
}

impl<R, P> std::fmt::Debug for OutboxRelay<R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxRelay")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<R, P> OutboxRelay<R, P>
where
    R: OutboxRepository,
    P: MessagePublisher,
{
    /// Creates a relay.
    #[must_use]
    pub fn new(repository: R, publisher: P, clock: Arc<dyn Clock>, config: OutboxRelayConfig) -> Self {
        Self {
            repository,
            publisher,
            clock,
            config,
        }
    }

    /// The relay settings.
    #[must_use]
    pub fn config(&self) -> &OutboxRelayConfig {
        &self.config
    }

    /// Runs one cycle over the oldest `batch_size` pending rows.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the pending rows cannot be fetched.
    /// Publish and bookkeeping failures are reported in the
    /// [`RelayReport`] instead.
    pub async fn run_once(&self) -> Result<RelayReport, DomainError> {
        let pending = self.repository.find_pending(self.config.batch_size).await?;
        if pending.is_empty() {
            return Ok(RelayReport::default());
        }
        let topics = group_by_topic(pending);
        let reports = join_all(
            topics
                .into_iter()
                .map(|(topic, rows)| self.relay_topic(topic, rows)),
        )
        .await;
        let report = reports.into_iter().fold(RelayReport::default(), RelayReport::merge);
        debug!(
            published = report.published,
            failed = report.failed,
            deferred = report.deferred,
            "outbox relay cycle finished"
        );
        Ok(report)
    }

    async fn relay_topic(&self, topic: String, rows: Vec<OutboxEvent>) -> RelayReport {
        let mut report = RelayReport::default();
        let total = rows.len();
        for (position, row) in rows.into_iter().enumerate() {
            if self.relay_row(&row).await {
                report.published += 1;
            } else {
                report.failed += 1;
                report.deferred = total - position - 1;
                if report.deferred > 0 {
                    debug!(%topic, deferred = report.deferred, "deferring rest of topic");
                }
                break;
            }
        }
        report
    }

    async fn relay_row(&self, row: &OutboxEvent) -> bool {
        match self.publish(row).await {
            Ok(()) => match self.repository.mark_dispatched(row.id, self.clock.now()).await {
                Ok(()) => {
                    debug!(outbox_id = %row.id, topic = %row.topic, "outbox event dispatched");
                    true
                }
                Err(e) => {
                    warn!(
                        outbox_id = %row.id,
                        error = %e,
                        "published but could not mark dispatched; will publish again"
                    );
                    false
                }
            },
            Err(e) => {
                warn!(outbox_id = %row.id, topic = %row.topic, error = %e, "outbox publish failed");
                match self.repository.record_failure(row.id).await {
                    Ok(updated) if updated.state == OutboxState::Exhausted => {
                        error!(
                            outbox_id = %row.id,
                            retries = updated.retry_count,
                            "outbox event exhausted its retries"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(outbox_id = %row.id, error = %e, "could not record publish failure");
                    }
                }
                false
            }
        }
    }

    async fn publish(&self, row: &OutboxEvent) -> Result<(), PublishError> {
        let timeout = self.config.publish_timeout;
        tokio::time::timeout(timeout, self.publisher.publish(&row.topic, &row.payload))
            .await
            .unwrap_or(Err(PublishError::TimedOut(timeout)))
    }

    /// Deletes dispatched rows older than the retention period.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the retention reaches
    /// past the earliest representable time, or `DomainError` if the rows
    /// cannot be queried or removed.
    pub async fn cleanup(&self) -> Result<u64, DomainError> {
        let now = self.clock.now();
        let cutoff = now
            .checked_sub_signed(self.config.retention)
            .ok_or_else(|| DomainError::invalid("outbox retention reaches before the earliest time"))?;
        let removed = self.repository.delete_dispatched_before(cutoff).await?;
        if removed > 0 {
            info!(removed, %cutoff, "outbox cleanup removed dispatched events");
        }
        Ok(removed)
    }

    /// Runs cycles every `poll_interval` until `shutdown` turns `true` or
    /// its sender is dropped. Fetch failures are logged and retried on the
    /// next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = u64::try_from(self.config.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "outbox relay started"
        );
        while !*shutdown.borrow() {
            if let Err(e) = self.run_once().await {
                warn!(error = %e, "outbox relay cycle failed; retrying next tick");
            }
            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("outbox relay stopped");
    }
}
