//! User lookups on top of any `Repository<User>`.

use async_trait::async_trait;
use tessera_core::criteria::{Criteria, FilterOperator};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;

use super::aggregates::{User, normalize_email};

fn by(field: &str, value: String) -> Result<Criteria, DomainError> {
    Criteria::builder()
        .filter_by(field, FilterOperator::Equal, value)
        .build()
}

/// Uniqueness checks and lookups, provided for every repository of
/// [`User`]s.
#[async_trait]
pub trait UserRepository: Repository<User> {
    /// Returns `true` if a user has this email (compared normalized).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query fails.
    async fn exists_by_email(&self, email: &str) -> Result<bool, DomainError> {
        let criteria = by("email", normalize_email(email))?;
        Ok(self.count_by_criteria(&criteria).await? > 0)
    }

    /// Returns `true` if a user has this username.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query fails.
    async fn exists_by_username(&self, username: &str) -> Result<bool, DomainError> {
        let criteria = by("username", username.trim().to_owned())?;
        Ok(self.count_by_criteria(&criteria).await? > 0)
    }

    /// Finds the user with this email.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query fails.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let criteria = by("email", normalize_email(email))?;
        Ok(self.find_by_criteria(&criteria).await?.items.into_iter().next())
    }
}

impl<R: Repository<User> + ?Sized> UserRepository for R {}
