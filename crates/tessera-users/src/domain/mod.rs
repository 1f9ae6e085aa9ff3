//! Domain layer for the Users context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod repository;
