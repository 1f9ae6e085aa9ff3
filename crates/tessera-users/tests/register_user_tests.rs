//! Registration write path: user, outbox row and domain events in one unit
//! of work.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use tessera_document::{DocumentRepository, DocumentStore};
use tessera_memory::{MemoryRepository, MemoryUnitOfWork};
use tessera_outbox::{OutboxEvent, OutboxWriter};
use tessera_test_support::{FailingEventBus, FailingSaves, FixedClock, RecordingEventBus};
use tessera_users::application::command_handlers::handle_register_user;
use tessera_users::domain::aggregates::User;
use tessera_users::domain::commands::RegisterUser;
use tessera_users::domain::repository::UserRepository;
use uuid::Uuid;

fn clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
}

fn command(email: &str, username: &str) -> RegisterUser {
    RegisterUser {
        correlation_id: Uuid::new_v4(),
        email: email.to_owned(),
        username: username.to_owned(),
        first_name: "Ada".to_owned(),
        last_name: "Lovelace".to_owned(),
    }
}

struct World {
    uow: MemoryUnitOfWork,
    users: MemoryRepository<User>,
    outbox_rows: MemoryRepository<OutboxEvent>,
    bus: RecordingEventBus,
}

impl World {
    fn new() -> Self {
        Self {
            uow: MemoryUnitOfWork::new(),
            users: MemoryRepository::new(),
            outbox_rows: MemoryRepository::new(),
            bus: RecordingEventBus::new(),
        }
    }

    fn writer(&self) -> OutboxWriter<MemoryRepository<OutboxEvent>> {
        OutboxWriter::new(self.outbox_rows.clone(), Arc::new(clock()))
    }

    async fn register(&self, command: &RegisterUser) -> Result<Uuid, DomainError> {
        handle_register_user(command, &clock(), &self.uow, &self.users, &self.writer(), &self.bus).await
    }
}

#[tokio::test]
async fn test_register_user_saves_user_outbox_row_and_publishes_domain_event() {
    // Arrange
    let world = World::new();

    // Act
    let id = world
        .register(&command("Ada@Example.com", "ada"))
        .await
        .unwrap();

    // Assert
    let user = world.users.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.created_at, clock().0);

    let rows = world.outbox_rows.snapshot();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_name, "user.created");
    assert_eq!(rows[0].topic, "users");
    let payload: serde_json::Value = serde_json::from_str(&rows[0].payload).unwrap();
    assert_eq!(payload["id"], serde_json::json!(id.to_string()));
    assert_eq!(payload["email"], serde_json::json!("ada@example.com"));

    assert_eq!(world.bus.published(), vec![("users.user_registered", id)]);
}

#[tokio::test]
async fn test_register_user_rejects_duplicate_email_before_writing() {
    // Arrange
    let world = World::new();
    world.register(&command("ada@example.com", "ada")).await.unwrap();

    // Act
    let result = world.register(&command(" ADA@example.com", "other")).await;

    // Assert
    match result {
        Err(DomainError::AlreadyExists { field, value }) => {
            assert_eq!(field, "email");
            assert_eq!(value, "ada@example.com");
        }
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
    assert_eq!(world.users.snapshot().len(), 1);
    assert_eq!(world.outbox_rows.snapshot().len(), 1);
}

#[tokio::test]
async fn test_register_user_rejects_duplicate_username() {
    let world = World::new();
    world.register(&command("ada@example.com", "ada")).await.unwrap();

    let result = world.register(&command("grace@example.com", "ada")).await;

    assert!(matches!(
        result,
        Err(DomainError::AlreadyExists { ref field, .. }) if field == "username"
    ));
}

#[tokio::test]
async fn test_register_user_rejects_malformed_email() {
    let world = World::new();

    let result = world.register(&command("not-an-email", "ada")).await;

    assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    assert!(world.users.snapshot().is_empty());
}

#[tokio::test]
async fn test_outbox_failure_rolls_back_user() {
    // Arrange
    let uow = MemoryUnitOfWork::new();
    let users = MemoryRepository::<User>::new();
    let outbox_rows = MemoryRepository::<OutboxEvent>::new();
    let failing = OutboxWriter::new(FailingSaves::new(outbox_rows.clone()), Arc::new(clock()));
    let bus = RecordingEventBus::new();

    // Act
    let result = handle_register_user(
        &command("ada@example.com", "ada"),
        &clock(),
        &uow,
        &users,
        &failing,
        &bus,
    )
    .await;

    // Assert
    assert!(matches!(result, Err(DomainError::Infrastructure { .. })));
    assert!(!users.exists_by_email("ada@example.com").await.unwrap());
    assert!(outbox_rows.snapshot().is_empty());
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn test_event_bus_failure_rolls_back_user_and_outbox_row() {
    let world = World::new();

    let result = handle_register_user(
        &command("ada@example.com", "ada"),
        &clock(),
        &world.uow,
        &world.users,
        &world.writer(),
        &FailingEventBus,
    )
    .await;

    assert!(result.is_err());
    assert!(world.users.find_by_email("ada@example.com").await.unwrap().is_none());
    assert!(world.outbox_rows.snapshot().is_empty());
}

#[tokio::test]
async fn test_numeric_looking_usernames_are_distinct() {
    // Arrange
    let world = World::new();
    world.register(&command("bond@example.com", "007")).await.unwrap();

    // Act
    let seven = world.register(&command("seven@example.com", "7")).await;
    let again = world.register(&command("other@example.com", "007")).await;

    // Assert
    assert!(seven.is_ok());
    assert!(matches!(
        again,
        Err(DomainError::AlreadyExists { ref field, .. }) if field == "username"
    ));
}

#[tokio::test]
async fn test_document_backend_finds_numeric_looking_username() {
    // Arrange
    let users = DocumentRepository::<User>::new(DocumentStore::new());
    let user = User::register("bond@example.com", "007", "James", "Bond", &clock()).unwrap();
    users.save(&user, None).await.unwrap();

    // Act
    let exists = users.exists_by_username("007").await.unwrap();
    let other = users.exists_by_username("7").await.unwrap();

    // Assert
    assert!(exists);
    assert!(!other);
}
