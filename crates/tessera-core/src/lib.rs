//! Tessera Core — shared persistence abstractions.
//!
//! This crate defines the criteria model, the repository and unit-of-work
//! contracts, and the event and error types every backend and bounded
//! context depends on. It contains no storage code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod criteria;
pub mod error;
pub mod event;
pub mod repository;
pub mod unit_of_work;
