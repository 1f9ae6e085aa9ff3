//! Aggregate roots for the Users context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::aggregate::{Aggregate, AggregateRoot, FieldKind, QueryableField};
use tessera_core::clock::Clock;
use tessera_core::error::DomainError;
use uuid::Uuid;

use super::events::UserRegistered;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Lowercased, trimmed email.
    pub email: String,
    /// Unique handle.
    pub username: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Events raised since the last pull.
    #[serde(skip)]
    pending_events: Vec<UserRegistered>,
}

const USER_FIELDS: &[QueryableField] = &[
    QueryableField::new("email", FieldKind::Text),
    QueryableField::new("username", FieldKind::Text),
    QueryableField::new("firstName", FieldKind::Text),
    QueryableField::new("lastName", FieldKind::Text),
    QueryableField::new("createdAt", FieldKind::Timestamp),
    QueryableField::new("updatedAt", FieldKind::Timestamp),
];

impl Aggregate for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }

    fn queryable_fields() -> &'static [QueryableField] {
        USER_FIELDS
    }
}

impl AggregateRoot for User {
    type Event = UserRegistered;

    fn pull_domain_events(&mut self) -> Vec<UserRegistered> {
        std::mem::take(&mut self.pending_events)
    }
}

/// Trims and lowercases an email address.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.trim().is_empty() && !domain.trim().is_empty() && !domain.contains('@')
        });
    if valid {
        Ok(())
    } else {
        Err(DomainError::invalid(format!("'{email}' is not a valid email")))
    }
}

fn require(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_owned())
}

impl User {
    /// Registers a new user and raises [`UserRegistered`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the email is malformed or
    /// the username or a name is blank.
    pub fn register(
        email: &str,
        username: &str,
        first_name: &str,
        last_name: &str,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        let username = require("username", username)?;
        let first_name = require("first name", first_name)?;
        let last_name = require("last name", last_name)?;

        let now = clock.now();
        let id = Uuid::new_v4();
        Ok(Self {
            id,
            pending_events: vec![UserRegistered {
                user_id: id,
                email: email.clone(),
                username: username.clone(),
                occurred_at: now,
            }],
            email,
            username,
            first_name,
            last_name,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;
    use tessera_core::clock::SystemClock;

    use super::*;

    struct At(DateTime<Utc>);

    impl Clock for At {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn test_register_normalizes_and_raises_event() {
        // Arrange
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();

        // Act
        let mut user = User::register("  Ada@Example.COM ", " ada ", "Ada", "Lovelace", &At(now)).unwrap();
        let events = user.pull_domain_events();

        // Assert
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.username, "ada");
        assert_eq!(user.created_at, now);
        assert_eq!(user.updated_at, now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, user.id);
        assert_eq!(events[0].email, "ada@example.com");
        assert!(user.pull_domain_events().is_empty());
    }

    #[rstest]
    #[case("no-at-sign", "ada", "Ada", "Lovelace")]
    #[case("@example.com", "ada", "Ada", "Lovelace")]
    #[case("ada@", "ada", "Ada", "Lovelace")]
    #[case("a@b@c", "ada", "Ada", "Lovelace")]
    #[case("ada@example.com", "  ", "Ada", "Lovelace")]
    #[case("ada@example.com", "ada", "", "Lovelace")]
    #[case("ada@example.com", "ada", "Ada", " ")]
    fn test_register_rejects_invalid_input(
        #[case] email: &str,
        #[case] username: &str,
        #[case] first: &str,
        #[case] last: &str,
    ) {
        let result = User::register(email, username, first, last, &SystemClock);

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn test_pending_events_are_not_serialized() {
        let user = User::register("ada@example.com", "ada", "Ada", "Lovelace", &SystemClock).unwrap();

        let value = serde_json::to_value(&user).unwrap();

        assert!(value.get("pendingEvents").is_none());
        assert!(value.get("firstName").is_some());
    }
}
