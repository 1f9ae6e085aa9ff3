//! Tessera Memory — in-process storage backend.
//!
//! Aggregates live in a shared vector per repository. Criteria are evaluated
//! by projecting each aggregate to JSON and running a predicate, comparator
//! and slice pipeline over it. Intended for tests and single-process use.

pub mod context;
pub mod converter;
pub mod repository;

pub use context::{MemoryContext, MemoryUnitOfWork};
pub use converter::{MemoryCriteriaConverter, MemoryQuery};
pub use repository::MemoryRepository;
