//! Backend-agnostic contract for the outbox queries.
//!
//! [`OutboxRepository`] is provided for every `Repository<OutboxEvent>`, so
//! each backend runs the same checks through
//! [`outbox_contract_tests!`](crate::outbox_contract_tests) or, for
//! `PostgreSQL`, one `#[sqlx::test]` per check.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use tessera_outbox::{OutboxEvent, OutboxRepository, OutboxState};
use uuid::Uuid;

use crate::clock::SteppingClock;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

fn payloads(rows: &[OutboxEvent]) -> Vec<String> {
    rows.iter().map(|r| r.payload.clone()).collect()
}

/// An outbox repository under test.
#[derive(Debug)]
pub struct OutboxContractFixture<R> {
    /// Repository of [`OutboxEvent`]s.
    pub outbox: R,
}

impl<R: Repository<OutboxEvent>> OutboxContractFixture<R> {
    /// Wraps a repository.
    pub fn new(outbox: R) -> Self {
        Self { outbox }
    }

    /// Saves one pending row per payload, one second apart, newest first in
    /// insertion order so that storage order never explains the results.
    async fn seed(&self, payloads: &[&str]) -> Vec<OutboxEvent> {
        let clock = SteppingClock::new(start(), Duration::seconds(1));
        let rows: Vec<OutboxEvent> = payloads
            .iter()
            .map(|payload| OutboxEvent::new("test.event", "things", *payload, &clock))
            .collect();
        for row in rows.iter().rev() {
            self.outbox.save(row, None).await.unwrap();
        }
        rows
    }

    /// `find_pending` returns pending rows oldest first, up to the limit,
    /// and skips dispatched and exhausted rows.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_find_pending_oldest_first(&self) {
        // Arrange
        let rows = self.seed(&["1", "2", "3", "4", "5"]).await;
        self.outbox.mark_dispatched(rows[0].id, start()).await.unwrap();
        let mut exhausted = rows[2].clone();
        exhausted.state = OutboxState::Exhausted;
        self.outbox.save(&exhausted, None).await.unwrap();

        // Act
        let limited = self.outbox.find_pending(2).await.unwrap();
        let all = self.outbox.find_pending(10).await.unwrap();

        // Assert
        assert_eq!(payloads(&limited), vec!["2", "4"]);
        assert_eq!(payloads(&all), vec!["2", "4", "5"]);
        assert!(self.outbox.find_pending(0).await.unwrap().is_empty());
    }

    /// `mark_dispatched` stores the dispatch time and state.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_mark_dispatched(&self) {
        let rows = self.seed(&["1"]).await;
        let at = start() + Duration::minutes(1);

        self.outbox.mark_dispatched(rows[0].id, at).await.unwrap();

        let stored = self.outbox.find_by_id(rows[0].id).await.unwrap().unwrap();
        assert_eq!(stored.state, OutboxState::Dispatched);
        assert_eq!(stored.dispatched_at, Some(at));
    }

    /// Bookkeeping on an unknown row is `NotFound`.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_unknown_row_is_not_found(&self) {
        let id = Uuid::new_v4();

        let dispatched = self.outbox.mark_dispatched(id, start()).await;
        let failed = self.outbox.record_failure(id).await;

        assert!(matches!(dispatched, Err(DomainError::NotFound { .. })));
        assert!(matches!(failed, Err(DomainError::NotFound { .. })));
    }

    /// Failures count up to `max_retries`, then the row is exhausted and
    /// no longer pending; a further failure is rejected.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_record_failure_until_exhausted(&self) {
        // Arrange
        let rows = self.seed(&["1"]).await;
        let id = rows[0].id;

        // Act
        let mut last = None;
        for _ in 0..rows[0].max_retries {
            last = Some(self.outbox.record_failure(id).await.unwrap());
        }
        let beyond = self.outbox.record_failure(id).await;

        // Assert
        let last = last.unwrap();
        assert_eq!(last.state, OutboxState::Exhausted);
        assert_eq!(last.retry_count, last.max_retries);
        assert_eq!(self.outbox.find_by_id(id).await.unwrap(), Some(last));
        assert!(matches!(beyond, Err(DomainError::InvalidArgument(_))));
        assert!(self.outbox.find_pending(10).await.unwrap().is_empty());
    }

    /// `delete_dispatched_before` removes only dispatched rows older than
    /// the cutoff and reports how many it removed.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_delete_dispatched_before(&self) {
        // Arrange
        let rows = self.seed(&["old", "recent", "pending"]).await;
        let cutoff = start() + Duration::days(7);
        self.outbox
            .mark_dispatched(rows[0].id, cutoff - Duration::days(1))
            .await
            .unwrap();
        self.outbox
            .mark_dispatched(rows[1].id, cutoff + Duration::seconds(1))
            .await
            .unwrap();

        // Act
        let removed = self.outbox.delete_dispatched_before(cutoff).await.unwrap();
        let again = self.outbox.delete_dispatched_before(cutoff).await.unwrap();

        // Assert
        assert_eq!(removed, 1);
        assert_eq!(again, 0);
        assert!(!self.outbox.exists(rows[0].id).await.unwrap());
        assert!(self.outbox.exists(rows[1].id).await.unwrap());
        assert!(self.outbox.exists(rows[2].id).await.unwrap());
    }
}

/// Generates one `#[tokio::test]` per outbox contract check. The argument
/// is an expression building a fresh [`OutboxContractFixture`] for each
/// test.
#[macro_export]
macro_rules! outbox_contract_tests {
    ($fixture:expr) => {
        $crate::outbox_contract_tests!(@tests $fixture;
            test_outbox_find_pending_oldest_first => check_find_pending_oldest_first,
            test_outbox_mark_dispatched => check_mark_dispatched,
            test_outbox_unknown_row_is_not_found => check_unknown_row_is_not_found,
            test_outbox_record_failure_until_exhausted => check_record_failure_until_exhausted,
            test_outbox_delete_dispatched_before => check_delete_dispatched_before,
        );
    };
    (@tests $fixture:expr; $($name:ident => $check:ident,)*) => {
        $(
            #[tokio::test]
            async fn $name() {
                let fixture = $fixture;
                fixture.$check().await;
            }
        )*
    };
}
