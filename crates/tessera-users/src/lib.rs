//! Tessera — Users bounded context.
//!
//! Registers users and lists them through criteria. Registration writes the
//! user and its `user.created` integration event in one unit of work.

pub mod application;
pub mod domain;
