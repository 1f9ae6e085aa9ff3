//! Tessera Postgres — `PostgreSQL` backend.
//!
//! Each aggregate type maps to a table `(id UUID PRIMARY KEY, document
//! JSONB NOT NULL, inserted_at TIMESTAMPTZ)`. Criteria become a WHERE /
//! ORDER BY / LIMIT clause over typed casts of the JSONB document, with
//! every value bound as a parameter.

pub mod context;
pub mod converter;
pub mod repository;
pub mod schema;

pub use context::{PgContext, PgUnitOfWork};
pub use converter::{SqlCriteriaConverter, SqlQuery};
pub use repository::PgRepository;
