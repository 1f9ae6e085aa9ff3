//! The document and in-memory converters return the same records in the
//! same order for the same criteria and dataset.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tessera_core::aggregate::Aggregate;
use tessera_core::criteria::{Criteria, Order, Pagination};
use tessera_core::repository::Repository;
use tessera_document::{DocumentRepository, DocumentStore};
use tessera_memory::MemoryRepository;
use tessera_test_support::{SampleRecord, generated_criteria, sample_dataset};
use uuid::Uuid;

async fn seeded() -> (MemoryRepository<SampleRecord>, DocumentRepository<SampleRecord>) {
    let memory = MemoryRepository::new();
    let document = DocumentRepository::new(DocumentStore::new());
    for record in sample_dataset() {
        memory.save(&record, None).await.unwrap();
        document.save(&record, None).await.unwrap();
    }
    (memory, document)
}

fn ids(records: &[SampleRecord]) -> Vec<Uuid> {
    records.iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn test_converters_agree_on_every_generated_criteria() {
    // Arrange
    let (memory, document) = seeded().await;
    let all = generated_criteria();

    for criteria in &all {
        // Act
        let from_memory = memory.find_by_criteria(criteria).await.unwrap();
        let from_document = document.find_by_criteria(criteria).await.unwrap();

        // Assert
        assert_eq!(ids(&from_memory.items), ids(&from_document.items), "{criteria:?}");
        assert_eq!(from_memory.has_next, from_document.has_next, "{criteria:?}");
        assert_eq!(from_memory.next_cursor, from_document.next_cursor, "{criteria:?}");
        assert_eq!(
            memory.count_by_criteria(criteria).await.unwrap(),
            document.count_by_criteria(criteria).await.unwrap(),
            "{criteria:?}"
        );
    }
    assert!(all.len() > 1000);
}

#[tokio::test]
async fn test_cursor_tokens_are_interchangeable_between_backends() {
    let (memory, document) = seeded().await;
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
    let page = document.find_by_criteria(&second).await.unwrap();

    let names: Vec<_> = page.items.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Item 7", "Item 6", "Item 5"]);
}

/// An aggregate declaring no fields, so values keep their JSON types and
/// cursor values are inferred back from their text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Loose {
    id: Uuid,
    code: Value,
}

impl Aggregate for Loose {
    const COLLECTION: &'static str = "loose";

    fn id(&self) -> Uuid {
        self.id
    }
}

async fn walk<R: Repository<Loose>>(repo: &R, order: &Order, limit: u64) -> Vec<Uuid> {
    let mut seen = Vec::new();
    let mut pagination = Pagination::first_page(limit);
    loop {
        let criteria = Criteria::builder()
            .order(order.clone())
            .paginate(pagination)
            .build()
            .unwrap();
        let page = repo.find_by_criteria(&criteria).await.unwrap();
        seen.extend(page.items.iter().map(|l| l.id));
        match page.next_cursor {
            Some(token) => pagination = Pagination::cursor_from_token(limit, &token).unwrap(),
            None => return seen,
        }
    }
}

#[tokio::test]
async fn test_cursor_walks_over_mixed_types_agree_and_skip_nothing() {
    // Arrange
    let codes = [
        json!("alice"),
        json!(7),
        json!(true),
        json!("2026-01-02T00:00:00Z"),
        json!("bob"),
        json!(2.5),
        json!("zed"),
    ];
    let memory = MemoryRepository::new();
    let document = DocumentRepository::new(DocumentStore::new());
    for (n, code) in (1_u128..).zip(codes) {
        let record = Loose { id: Uuid::from_u128(n), code };
        memory.save(&record, None).await.unwrap();
        document.save(&record, None).await.unwrap();
    }

    for order in [Order::asc("code"), Order::desc("code")] {
        // Act
        let from_memory = walk(&memory, &order, 2).await;
        let from_document = walk(&document, &order, 2).await;

        // Assert
        assert_eq!(from_memory, from_document, "{order:?}");
        assert_eq!(from_memory.len(), 7, "{order:?}");
    }
}
