//! Backend-agnostic repository contract suite.
//!
//! Each backend builds a [`ContractFixture`] and runs every `check_*`
//! method against it, either one by one (as the `PostgreSQL` tests do,
//! since they need a pool per test) or through
//! [`repository_contract_tests!`](crate::repository_contract_tests).

use std::time::Duration;

use tessera_core::criteria::{
    Criteria, CriteriaPage, FilterOperator, Order, Pagination,
};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use tessera_core::unit_of_work::{RepositoryContext, UnitOfWork};
use uuid::Uuid;

use crate::sample::{SampleNote, SampleRecord, sample_dataset};

/// A unit of work and two repositories sharing its context type.
#[derive(Debug)]
pub struct ContractFixture<U, R, N> {
    /// Unit of work under test.
    pub uow: U,
    /// Repository of [`SampleRecord`]s.
    pub records: R,
    /// Repository of [`SampleNote`]s.
    pub notes: N,
}

fn names(page: &CriteriaPage<SampleRecord>) -> Vec<String> {
    page.items.iter().map(|r| r.name.clone()).collect()
}

fn items(numbers: &[u32]) -> Vec<String> {
    numbers.iter().map(|n| format!("Item {n}")).collect()
}

fn by_created_at() -> Order {
    Order::asc("createdAt")
}

fn note_for(record: &SampleRecord) -> SampleNote {
    SampleNote {
        id: Uuid::new_v4(),
        record_id: record.id,
        body: format!("note on {}", record.name),
    }
}

impl<U, R, N> ContractFixture<U, R, N>
where
    U: UnitOfWork,
    R: Repository<SampleRecord, Context = U::Context>,
    N: Repository<SampleNote, Context = U::Context>,
{
    /// Bundles a unit of work and its repositories.
    pub fn new(uow: U, records: R, notes: N) -> Self {
        Self {
            uow,
            records,
            notes,
        }
    }

    /// Saves the sample dataset outside any unit of work.
    ///
    /// # Panics
    ///
    /// Panics if a save fails.
    pub async fn seed(&self) -> Vec<SampleRecord> {
        let dataset = sample_dataset();
        for record in &dataset {
            self.records.save(record, None).await.unwrap();
        }
        dataset
    }

    async fn query(&self, criteria: &Criteria) -> Vec<String> {
        names(&self.records.find_by_criteria(criteria).await.unwrap())
    }

    /// `save` then `find_by_id` returns an equal aggregate.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_round_trip(&self) {
        // Arrange
        let record = sample_dataset().remove(2);

        // Act
        self.records.save(&record, None).await.unwrap();
        let loaded = self.records.find_by_id(record.id).await.unwrap();

        // Assert
        assert_eq!(loaded, Some(record));
        assert_eq!(self.records.find_by_id(Uuid::new_v4()).await.unwrap(), None);
    }

    /// A second `save` with the same id replaces the first.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_save_is_upsert(&self) {
        let mut record = sample_dataset().remove(0);
        self.records.save(&record, None).await.unwrap();

        record.name = "Renamed".to_owned();
        record.value = 11;
        self.records.save(&record, None).await.unwrap();

        assert_eq!(self.records.count_by_criteria(&Criteria::all()).await.unwrap(), 1);
        assert_eq!(self.records.find_by_id(record.id).await.unwrap(), Some(record));
    }

    /// `exists` tracks saves and removals; removing an unknown id is a
    /// no-op.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_exists_and_remove(&self) {
        let record = sample_dataset().remove(4);
        self.records.save(&record, None).await.unwrap();
        assert!(self.records.exists(record.id).await.unwrap());

        self.records.remove(record.id, None).await.unwrap();
        self.records.remove(Uuid::new_v4(), None).await.unwrap();

        assert!(!self.records.exists(record.id).await.unwrap());
        assert_eq!(self.records.find_by_id(record.id).await.unwrap(), None);
    }

    /// Every operator, AND-combination and missing-value rule.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_filter_operators(&self) {
        self.seed().await;
        let cases: [(&[(&str, FilterOperator, &str)], &[u32]); 12] = [
            (&[("status", FilterOperator::Equal, "active")], &[1, 3, 4, 6, 8, 10]),
            (&[("status", FilterOperator::NotEqual, "active")], &[2, 5, 7, 9]),
            (&[("category", FilterOperator::Contains, "TOOL")], &[1, 3, 6, 9]),
            (
                &[("category", FilterOperator::NotContains, "tool")],
                &[2, 4, 5, 7, 8, 10],
            ),
            (&[("value", FilterOperator::Gt, "50")], &[6, 7, 9, 10]),
            (&[("value", FilterOperator::Lt, "30")], &[1, 2]),
            (
                &[("createdAt", FilterOperator::Gt, "2026-01-05T10:00:00Z")],
                &[6, 7, 8, 9, 10],
            ),
            (&[("createdAt", FilterOperator::Gt, "2026-01-05")], &[5, 6, 7, 8, 9, 10]),
            (&[("value", FilterOperator::Contains, "00")], &[10]),
            (&[("score", FilterOperator::Gt, "3")], &[1, 4, 7, 8]),
            (
                &[("score", FilterOperator::NotEqual, "4.5")],
                &[2, 3, 5, 6, 7, 8, 9, 10],
            ),
            (
                &[
                    ("status", FilterOperator::Equal, "active"),
                    ("value", FilterOperator::Gt, "30"),
                ],
                &[6, 10],
            ),
        ];

        for (filters, expected) in cases {
            let criteria = filters
                .iter()
                .fold(Criteria::builder(), |builder, (field, op, value)| {
                    builder.filter_by(field, *op, *value)
                })
                .order(by_created_at())
                .build()
                .unwrap();

            assert_eq!(self.query(&criteria).await, items(expected), "filters {filters:?}");
        }
    }

    /// Sorting with id tiebreaks, nulls first ascending and last
    /// descending, and byte-wise text order.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_sort_order(&self) {
        self.seed().await;
        let cases: [(Order, &[u32]); 6] = [
            (Order::asc("value"), &[1, 2, 8, 4, 3, 5, 6, 7, 9, 10]),
            (Order::desc("value"), &[10, 9, 7, 6, 5, 3, 4, 8, 2, 1]),
            (Order::asc("score"), &[9, 3, 10, 5, 6, 2, 8, 4, 1, 7]),
            (Order::desc("score"), &[7, 1, 4, 8, 2, 6, 5, 10, 3, 9]),
            (Order::asc("name"), &[1, 10, 2, 3, 4, 5, 6, 7, 8, 9]),
            (Order::asc("category"), &[6, 8, 5, 2, 10, 7, 4, 9, 3, 1]),
        ];

        for (order, expected) in cases {
            let criteria = Criteria::builder().order(order.clone()).build().unwrap();

            assert_eq!(self.query(&criteria).await, items(expected), "order {order:?}");
        }
    }

    /// Offset windows, including empty and out-of-range windows.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_offset_pagination(&self) {
        self.seed().await;
        let cases: [(u64, u64, &[u32], bool); 5] = [
            (2, 2, &[3, 4], true),
            (5, 5, &[6, 7, 8, 9, 10], false),
            (0, 0, &[], true),
            (3, 10, &[], false),
            (3, 50, &[], false),
        ];

        for (limit, offset, expected, has_next) in cases {
            let criteria = Criteria::builder()
                .order(by_created_at())
                .offset(limit, offset)
                .build()
                .unwrap();

            let page = self.records.find_by_criteria(&criteria).await.unwrap();

            assert_eq!(names(&page), items(expected), "limit {limit} offset {offset}");
            assert_eq!(page.has_next, has_next, "limit {limit} offset {offset}");
            assert_eq!(page.next_cursor, None);
        }
    }

    async fn walk(&self, order: &Order, limit: u64) -> Vec<Vec<String>> {
        let mut pages = Vec::new();
        let mut pagination = Pagination::first_page(limit);
        loop {
            let criteria = Criteria::builder()
                .order(order.clone())
                .paginate(pagination)
                .build()
                .unwrap();
            let page = self.records.find_by_criteria(&criteria).await.unwrap();
            pages.push(names(&page));
            match page.next_cursor {
                Some(token) => pagination = Pagination::cursor_from_token(limit, &token).unwrap(),
                None => return pages,
            }
        }
    }

    /// A cursor walk visits every record exactly once, in order.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_cursor_walk(&self) {
        self.seed().await;

        let ascending = self.walk(&Order::asc("value"), 3).await;
        let descending = self.walk(&Order::desc("createdAt"), 4).await;

        assert_eq!(ascending.concat(), items(&[1, 2, 8, 4, 3, 5, 6, 7, 9, 10]));
        assert_eq!(ascending.len(), 4);
        assert_eq!(descending.concat(), items(&[10, 9, 8, 7, 6, 5, 4, 3, 2, 1]));
        assert_eq!(descending.len(), 3);
    }

    /// Records inserted between pages never cause a skip or a duplicate:
    /// one sorting before the cursor is not seen, one after it is seen
    /// once.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_cursor_walk_with_concurrent_insert(&self) {
        // Arrange
        self.seed().await;
        let order = Order::asc("value");
        let first = Criteria::builder()
            .order(order.clone())
            .paginate(Pagination::first_page(3))
            .build()
            .unwrap();
        let first_page = self.records.find_by_criteria(&first).await.unwrap();
        let mut seen = names(&first_page);

        // Act
        let low = SampleRecord::new(Uuid::from_u128(100), "Late low", 5, "misc", "active", None, 20);
        let high = SampleRecord::new(Uuid::from_u128(101), "Late high", 95, "misc", "active", None, 21);
        self.records.save(&low, None).await.unwrap();
        self.records.save(&high, None).await.unwrap();
        let mut token = first_page.next_cursor;
        while let Some(current) = token {
            let criteria = Criteria::builder()
                .order(order.clone())
                .paginate(Pagination::cursor_from_token(3, &current).unwrap())
                .build()
                .unwrap();
            let page = self.records.find_by_criteria(&criteria).await.unwrap();
            seen.extend(names(&page));
            token = page.next_cursor;
        }

        // Assert
        let mut expected = items(&[1, 2, 8, 4, 3, 5, 6, 7, 9]);
        expected.push("Late high".to_owned());
        expected.push("Item 10".to_owned());
        assert_eq!(seen, expected);
    }

    /// Text fields compare as text even when values look like numbers,
    /// booleans or dates, and a cursor walk over them matches the single
    /// page order.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_text_values_stay_text(&self) {
        // Arrange
        let labels = ["007", "7", "alice", "Bob", "10", "true", "2026-01-02"];
        for (n, label) in (1_u128..).zip(labels) {
            let record = SampleRecord::new(Uuid::from_u128(n), label, 1, "misc", "active", None, 1);
            self.records.save(&record, None).await.unwrap();
        }
        let equal = |value: &str| {
            Criteria::builder()
                .filter_by("name", FilterOperator::Equal, value)
                .build()
                .unwrap()
        };

        // Act
        let zero_zero_seven = self.query(&equal("007")).await;
        let seven = self.query(&equal("7")).await;
        let truthy = self.query(&equal("true")).await;
        let ascending = self.walk(&Order::asc("name"), 2).await.concat();
        let descending = self.walk(&Order::desc("name"), 3).await.concat();

        // Assert
        assert_eq!(zero_zero_seven, vec!["007"]);
        assert_eq!(seven, vec!["7"]);
        assert_eq!(truthy, vec!["true"]);
        let sorted = ["007", "10", "2026-01-02", "7", "Bob", "alice", "true"];
        assert_eq!(ascending, sorted);
        let reversed: Vec<&str> = sorted.iter().rev().copied().collect();
        assert_eq!(descending, reversed);
    }

    /// Counting ignores pagination; the envelope carries the total on
    /// request.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_count_and_total(&self) {
        self.seed().await;
        let criteria = Criteria::builder()
            .filter_by("status", FilterOperator::Equal, "active")
            .order(by_created_at())
            .offset(2, 0)
            .with_total()
            .build()
            .unwrap();

        let page = self.records.find_by_criteria(&criteria).await.unwrap();
        let count = self.records.count_by_criteria(&criteria).await.unwrap();

        assert_eq!(names(&page), items(&[1, 3]));
        assert_eq!(page.total, Some(6));
        assert!(page.has_next);
        assert_eq!(count, 6);
        assert_eq!(self.records.count_by_criteria(&Criteria::all()).await.unwrap(), 10);
    }

    /// A failing unit of work leaves no trace in either repository and
    /// restores pre-existing data.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_rollback_on_failure(&self) {
        // Arrange
        let mut dataset = sample_dataset();
        let existing = dataset.remove(0);
        let doomed = dataset.remove(0);
        self.records.save(&existing, None).await.unwrap();
        let note = note_for(&doomed);
        let (doomed_id, note_id) = (doomed.id, note.id);
        let mut changed = existing.clone();
        changed.name = "Changed".to_owned();

        // Act
        let result: Result<(), DomainError> = self
            .uow
            .run(|ctx| async move {
                self.records.save(&changed, Some(&ctx)).await?;
                self.records.save(&doomed, Some(&ctx)).await?;
                self.notes.save(&note, Some(&ctx)).await?;
                Err(DomainError::invalid("forced failure"))
            })
            .await;

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
        assert_eq!(self.records.find_by_id(existing.id).await.unwrap(), Some(existing));
        assert!(!self.records.exists(doomed_id).await.unwrap());
        assert!(!self.notes.exists(note_id).await.unwrap());
    }

    /// A successful unit of work commits writes to both repositories.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_commit_spans_repositories(&self) {
        let record = sample_dataset().remove(5);
        let note = note_for(&record);
        let record_id = record.id;

        let id = self
            .uow
            .run(|ctx| async move {
                self.records.save(&record, Some(&ctx)).await?;
                self.notes.save(&note, Some(&ctx)).await?;
                Ok::<_, DomainError>(note.id)
            })
            .await
            .unwrap();

        assert!(self.records.exists(record_id).await.unwrap());
        assert_eq!(
            self.notes.find_by_id(id).await.unwrap().map(|n| n.record_id),
            Some(record_id)
        );
    }

    /// Removals inside a unit of work are undone by a rollback.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_remove_rolls_back(&self) {
        let record = sample_dataset().remove(6);
        self.records.save(&record, None).await.unwrap();
        let context = self.uow.begin().await.unwrap();

        self.records.remove(record.id, Some(&context)).await.unwrap();
        context.rollback().await.unwrap();

        assert!(self.records.exists(record.id).await.unwrap());
    }

    /// Exceeding the deadline rolls back and reports an infrastructure
    /// failure.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_deadline_rolls_back(&self) {
        let record = sample_dataset().remove(7);
        let record_id = record.id;

        let result: Result<(), DomainError> = self
            .uow
            .run_with_deadline(Duration::from_millis(50), |ctx| async move {
                self.records.save(&record, Some(&ctx)).await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Infrastructure { ref operation, .. }) if operation == "unit_of_work"
        ));
        assert!(!self.records.exists(record_id).await.unwrap());
    }

    /// Completed contexts reject writes; rollback is idempotent; commit
    /// after rollback fails.
    ///
    /// # Panics
    ///
    /// Panics if the contract is violated.
    pub async fn check_context_lifecycle(&self) {
        let record = sample_dataset().remove(8);

        let committed = self.uow.begin().await.unwrap();
        committed.commit().await.unwrap();
        committed.commit().await.unwrap();
        let late_write = self.records.save(&record, Some(&committed)).await;

        let rolled_back = self.uow.begin().await.unwrap();
        rolled_back.rollback().await.unwrap();
        rolled_back.rollback().await.unwrap();
        let late_commit = rolled_back.commit().await;

        assert!(matches!(late_write, Err(DomainError::InvalidArgument(_))));
        assert!(matches!(late_commit, Err(DomainError::InvalidArgument(_))));
        assert!(!committed.is_active());
        assert!(!self.records.exists(record.id).await.unwrap());
    }
}

/// Generates one `#[tokio::test]` per contract check. The argument is an
/// expression building a fresh [`ContractFixture`] for each test.
#[macro_export]
macro_rules! repository_contract_tests {
    ($fixture:expr) => {
        $crate::repository_contract_tests!(@tests $fixture;
            test_contract_round_trip => check_round_trip,
            test_contract_save_is_upsert => check_save_is_upsert,
            test_contract_exists_and_remove => check_exists_and_remove,
            test_contract_filter_operators => check_filter_operators,
            test_contract_sort_order => check_sort_order,
            test_contract_offset_pagination => check_offset_pagination,
            test_contract_cursor_walk => check_cursor_walk,
            test_contract_cursor_walk_with_concurrent_insert => check_cursor_walk_with_concurrent_insert,
            test_contract_text_values_stay_text => check_text_values_stay_text,
            test_contract_count_and_total => check_count_and_total,
            test_contract_rollback_on_failure => check_rollback_on_failure,
            test_contract_commit_spans_repositories => check_commit_spans_repositories,
            test_contract_remove_rolls_back => check_remove_rolls_back,
            test_contract_deadline_rolls_back => check_deadline_rolls_back,
            test_contract_context_lifecycle => check_context_lifecycle,
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
