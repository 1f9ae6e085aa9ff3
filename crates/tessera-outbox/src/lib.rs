//! Tessera Outbox — transactional outbox and relay.
//!
//! Integration events are saved as [`OutboxEvent`] rows in the same unit of
//! work as the aggregate change that produced them. The [`OutboxRelay`]
//! later hands pending rows to a [`MessagePublisher`] and marks them
//! dispatched, giving at-least-once delivery.

pub mod event;
pub mod publisher;
pub mod relay;
pub mod repository;
pub mod writer;

pub use event::{OutboxEvent, OutboxState};
pub use publisher::{LoggingPublisher, MessagePublisher, PublishError};
pub use relay::{OutboxRelay, OutboxRelayConfig, RelayReport};
pub use repository::OutboxRepository;
pub use writer::OutboxWriter;
