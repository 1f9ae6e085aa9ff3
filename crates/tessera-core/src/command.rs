//! Command abstractions.

use uuid::Uuid;

/// Trait that all application commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the write path and the
    /// integration events it produces.
    fn correlation_id(&self) -> Uuid;
}
