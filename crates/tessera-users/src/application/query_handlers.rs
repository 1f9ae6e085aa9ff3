//! Query handlers for the Users context.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tessera_core::criteria::{Criteria, CriteriaPage, FilterOperator, Order, Pagination};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use uuid::Uuid;

use crate::domain::aggregates::User;

/// Read-only view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    /// The user identifier.
    pub id: Uuid,
    /// Email.
    pub email: String,
    /// Username.
    pub username: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at,
        }
    }
}

/// Inputs of [`list_users`]. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct ListUsersQuery {
    /// Case-insensitive substring of the email.
    pub email_contains: Option<String>,
    /// Exact username.
    pub username: Option<String>,
    /// Only users registered strictly after this time.
    pub created_after: Option<DateTime<Utc>>,
    /// Sort order.
    pub order: Option<Order>,
    /// Offset or cursor pagination.
    pub pagination: Option<Pagination>,
    /// Include the total match count in the page.
    pub with_total: bool,
}

impl ListUsersQuery {
    /// Builds the criteria this query describes.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if an input is blank or cursor
    /// pagination is requested without an order.
    pub fn to_criteria(&self) -> Result<Criteria, DomainError> {
        let mut builder = Criteria::builder();
        if let Some(email) = &self.email_contains {
            builder = builder.filter_by("email", FilterOperator::Contains, email.as_str());
        }
        if let Some(username) = &self.username {
            builder = builder.filter_by("username", FilterOperator::Equal, username.as_str());
        }
        if let Some(after) = self.created_after {
            builder = builder.filter_by("createdAt", FilterOperator::Gt, after.to_rfc3339());
        }
        if let Some(order) = &self.order {
            builder = builder.order(order.clone());
        }
        if let Some(pagination) = &self.pagination {
            builder = builder.paginate(pagination.clone());
        }
        if self.with_total {
            builder = builder.with_total();
        }
        builder.build()
    }
}

/// Retrieves a user by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no user has the id, or
/// `DomainError::Infrastructure` if the lookup fails.
pub async fn get_user_by_id<R>(id: Uuid, users: &R) -> Result<UserView, DomainError>
where
    R: Repository<User>,
{
    users
        .find_by_id(id)
        .await?
        .map(UserView::from)
        .ok_or_else(|| DomainError::not_found("User", id))
}

/// Lists users matching `query`.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` for invalid query inputs, or
/// `DomainError::Infrastructure` if the query fails.
pub async fn list_users<R>(
    query: &ListUsersQuery,
    users: &R,
) -> Result<CriteriaPage<UserView>, DomainError>
where
    R: Repository<User>,
{
    let criteria = query.to_criteria()?;
    Ok(users.find_by_criteria(&criteria).await?.map(UserView::from))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_empty_query_builds_unconstrained_criteria() {
        let criteria = ListUsersQuery::default().to_criteria().unwrap();

        assert_eq!(criteria, Criteria::all());
    }

    #[test]
    fn test_query_inputs_become_filters_in_order() {
        let query = ListUsersQuery {
            email_contains: Some("example".to_owned()),
            username: Some("ada".to_owned()),
            created_after: Some(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()),
            ..ListUsersQuery::default()
        };

        let criteria = query.to_criteria().unwrap();

        let fields: Vec<(&str, FilterOperator)> = criteria
            .filters()
            .iter()
            .map(|f| (f.field.as_str(), f.operator))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("email", FilterOperator::Contains),
                ("username", FilterOperator::Equal),
                ("createdAt", FilterOperator::Gt),
            ]
        );
    }

    #[test]
    fn test_cursor_without_order_is_rejected() {
        let query = ListUsersQuery {
            pagination: Some(Pagination::first_page(2)),
            ..ListUsersQuery::default()
        };

        assert!(matches!(query.to_criteria(), Err(DomainError::InvalidArgument(_))));
    }
}
