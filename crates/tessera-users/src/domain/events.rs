//! Domain and integration events for the Users context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tessera_core::error::DomainError;
use tessera_core::event::{DomainEvent, IntegrationEvent};
use uuid::Uuid;

/// Raised in-process when a user registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRegistered {
    /// The user identifier.
    pub user_id: Uuid,
    /// Normalized email.
    pub email: String,
    /// Username.
    pub username: String,
    /// Registration time.
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for UserRegistered {
    fn event_type(&self) -> &'static str {
        "users.user_registered"
    }

    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn to_payload(&self) -> serde_json::Value {
        json!({
            "userId": self.user_id,
            "email": self.email,
            "username": self.username,
            "occurredAt": self.occurred_at,
        })
    }
}

/// Announced to other services through the outbox when a user is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    /// The user identifier.
    pub id: Uuid,
    /// Normalized email.
    pub email: String,
    /// Username.
    pub username: String,
    /// Registration time.
    pub occurred_at: DateTime<Utc>,
}

/// Topic `user.created` is published on.
pub const USERS_TOPIC: &str = "users";

impl IntegrationEvent for UserCreated {
    fn event_name(&self) -> &'static str {
        "user.created"
    }

    fn topic(&self) -> &'static str {
        USERS_TOPIC
    }

    fn to_payload(&self) -> Result<String, DomainError> {
        serde_json::to_string(self)
            .map_err(|e| DomainError::invalid(format!("user.created payload: {e}")))
    }
}

impl From<&UserRegistered> for UserCreated {
    fn from(event: &UserRegistered) -> Self {
        Self {
            id: event.user_id,
            email: event.email.clone(),
            username: event.username.clone(),
            occurred_at: event.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn registered() -> UserRegistered {
        UserRegistered {
            user_id: Uuid::from_u128(1),
            email: "ada@example.com".to_owned(),
            username: "ada".to_owned(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_user_created_payload_is_camel_case_json() {
        let event = UserCreated::from(&registered());

        let payload: serde_json::Value = serde_json::from_str(&event.to_payload().unwrap()).unwrap();

        assert_eq!(
            payload,
            json!({
                "id": "00000000-0000-0000-0000-000000000001",
                "email": "ada@example.com",
                "username": "ada",
                "occurredAt": "2026-01-15T10:00:00Z",
            })
        );
        assert_eq!(event.event_name(), "user.created");
        assert_eq!(event.topic(), "users");
    }

    #[test]
    fn test_user_registered_reports_aggregate_and_type() {
        let event = registered();

        assert_eq!(event.event_type(), "users.user_registered");
        assert_eq!(event.aggregate_id(), Uuid::from_u128(1));
        assert_eq!(event.to_payload()["username"], json!("ada"));
    }
}
