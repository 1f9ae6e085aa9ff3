//! Shared test mocks, fixtures and the backend-agnostic repository and
//! outbox contract suites.

mod clock;
pub mod contract;
mod event_bus;
mod failing;
mod generated;
pub mod outbox_contract;
mod publisher;
mod sample;

pub use clock::{FixedClock, SteppingClock};
pub use contract::ContractFixture;
pub use event_bus::{FailingEventBus, RecordingEventBus};
pub use failing::FailingSaves;
pub use generated::generated_criteria;
pub use outbox_contract::OutboxContractFixture;
pub use publisher::{PublishOutcome, ScriptedPublisher};
pub use sample::{SampleNote, SampleRecord, sample_dataset};
