//! Tessera Document — document-store backend.
//!
//! [`store`] is a small embedded document store: named collections of JSON
//! documents queried with Mongo-style filter documents, plus sessions whose
//! staged writes apply atomically. The repository, converter and unit of
//! work sit on top of it the same way they would on a networked driver.

pub mod context;
pub mod converter;
pub mod matcher;
pub mod repository;
pub mod store;

pub use context::{DocumentContext, DocumentUnitOfWork};
pub use converter::{DocumentCriteriaConverter, DocumentQuery};
pub use repository::DocumentRepository;
pub use store::{DocumentError, DocumentStore, FindOptions, SortDirection};
