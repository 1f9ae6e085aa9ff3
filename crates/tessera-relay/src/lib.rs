//! Tessera relay — publishes outbox rows written by the services.

pub mod config;
pub mod error;
pub mod tasks;
