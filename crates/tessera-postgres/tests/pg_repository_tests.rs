//! Integration tests for `PgRepository` and `PgUnitOfWork`.

use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;
use tessera_core::criteria::{Criteria, FilterOperator, Order, Pagination};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use tessera_core::unit_of_work::{RepositoryContext, UnitOfWork};
use tessera_memory::MemoryRepository;
use tessera_postgres::{PgRepository, PgUnitOfWork};
use tessera_test_support::{SampleRecord, generated_criteria, sample_dataset};
use uuid::Uuid;

async fn seeded(pool: PgPool) -> (MemoryRepository<SampleRecord>, PgRepository<SampleRecord>) {
    let memory = MemoryRepository::new();
    let postgres = PgRepository::new(pool);
    for record in sample_dataset() {
        memory.save(&record, None).await.unwrap();
        postgres.save(&record, None).await.unwrap();
    }
    (memory, postgres)
}

fn ids(records: &[SampleRecord]) -> Vec<Uuid> {
    records.iter().map(|r| r.id).collect()
}

#[sqlx::test(migrations = "../../migrations", fixtures("sample_tables"))]
async fn test_sql_and_memory_converters_agree_on_every_generated_criteria(pool: PgPool) {
    // Arrange
    let (memory, postgres) = seeded(pool).await;

    for criteria in &generated_criteria() {
        // Act
        let from_memory = memory.find_by_criteria(criteria).await.unwrap();
        let from_postgres = postgres.find_by_criteria(criteria).await.unwrap();

        // Assert
        assert_eq!(ids(&from_memory.items), ids(&from_postgres.items), "{criteria:?}");
        assert_eq!(from_memory.has_next, from_postgres.has_next, "{criteria:?}");
        assert_eq!(from_memory.next_cursor, from_postgres.next_cursor, "{criteria:?}");
        assert_eq!(
            memory.count_by_criteria(criteria).await.unwrap(),
            postgres.count_by_criteria(criteria).await.unwrap(),
            "{criteria:?}"
        );
    }
}

#[sqlx::test(migrations = "../../migrations", fixtures("sample_tables"))]
async fn test_cursor_token_from_memory_resumes_in_postgres(pool: PgPool) {
    let (memory, postgres) = seeded(pool).await;
    let order = Order::desc("createdAt");
    let first = Criteria::builder()
        .order(order.clone())
        .paginate(Pagination::first_page(3))
        .build()
        .unwrap();
    let token = memory
        .find_by_criteria(&first)
        .await
        .unwrap()
        .next_cursor
        .unwrap();

    let second = Criteria::builder()
        .order(order)
        .paginate(Pagination::cursor_from_token(3, &token).unwrap())
        .build()
        .unwrap();
    let page = postgres.find_by_criteria(&second).await.unwrap();

    let names: Vec<_> = page.items.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Item 7", "Item 6", "Item 5"]);
}

#[sqlx::test(migrations = "../../migrations", fixtures("sample_tables"))]
async fn test_undeclared_filter_field_is_rejected_before_querying(pool: PgPool) {
    let repo = PgRepository::<SampleRecord>::new(pool);
    let criteria = Criteria::builder()
        .filter_by("document", FilterOperator::Equal, "x")
        .build()
        .unwrap();

    let result = repo.find_by_criteria(&criteria).await;

    assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
}

#[sqlx::test(migrations = "../../migrations", fixtures("sample_tables"))]
async fn test_writes_in_open_transaction_are_invisible_until_commit(pool: PgPool) {
    // Arrange
    let uow = PgUnitOfWork::new(pool.clone());
    let repo = PgRepository::<SampleRecord>::new(pool);
    let record = sample_dataset().remove(0);
    let context = uow.begin().await.unwrap();

    // Act
    repo.save(&record, Some(&context)).await.unwrap();
    let before_commit = repo.exists(record.id).await.unwrap();
    context.commit().await.unwrap();

    // Assert
    assert!(!before_commit);
    assert!(repo.exists(record.id).await.unwrap());
}

#[sqlx::test(migrations = "../../migrations", fixtures("sample_tables"))]
async fn test_dropping_active_context_rolls_back(pool: PgPool) {
    let uow = PgUnitOfWork::new(pool.clone());
    let repo = PgRepository::<SampleRecord>::new(pool);
    let record = sample_dataset().remove(1);

    let context = uow.begin().await.unwrap();
    repo.save(&record, Some(&context)).await.unwrap();
    drop(context);

    assert!(!repo.exists(record.id).await.unwrap());
}

#[sqlx::test(migrations = "../../migrations", fixtures("sample_tables"))]
async fn test_storage_failure_maps_to_infrastructure_error(pool: PgPool) {
    let repo = PgRepository::<SampleRecord>::new(pool.clone());
    sqlx::query("DROP TABLE sample_records")
        .execute(&pool)
        .await
        .unwrap();

    let result = repo.find_by_id(Uuid::new_v4()).await;

    assert!(matches!(
        result,
        Err(DomainError::Infrastructure { ref operation, .. }) if operation == "find_by_id"
    ));
}

#[sqlx::test(migrations = "../../migrations", fixtures("sample_tables"))]
async fn test_cursor_walk_over_sub_microsecond_timestamps_sees_each_row_once(pool: PgPool) {
    // Arrange
    let repo = PgRepository::<SampleRecord>::new(pool);
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
    let mut expected = Vec::new();
    for (n, nanos) in [900_i64, 1_100, 1_900, 2_900, 3_000].into_iter().enumerate() {
        let mut record = sample_dataset().remove(n);
        record.created_at = base + Duration::nanoseconds(nanos);
        repo.save(&record, None).await.unwrap();
        expected.push(record.id);
    }

    for order in [Order::asc("createdAt"), Order::desc("createdAt")] {
        // Act
        let mut seen = Vec::new();
        let mut pagination = Pagination::first_page(1);
        loop {
            let criteria = Criteria::builder()
                .order(order.clone())
                .paginate(pagination)
                .build()
                .unwrap();
            let page = repo.find_by_criteria(&criteria).await.unwrap();
            seen.extend(ids(&page.items));
            match page.next_cursor {
                Some(token) => pagination = Pagination::cursor_from_token(1, &token).unwrap(),
                None => break,
            }
        }

        // Assert
        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(seen.len(), expected.len(), "{order:?}");
        assert_eq!(sorted.len(), expected.len(), "{order:?}");
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_migrations_create_only_production_tables(pool: PgPool) {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_name NOT LIKE '\\_sqlx%' ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(tables, vec!["outbox_events".to_owned(), "users".to_owned()]);
}
