//! Commands for the Users context.

use tessera_core::command::Command;
use uuid::Uuid;

/// Command to register a new user.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Email address.
    pub email: String,
    /// Unique handle.
    pub username: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

impl Command for RegisterUser {
    fn command_type(&self) -> &'static str {
        "users.register_user"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
