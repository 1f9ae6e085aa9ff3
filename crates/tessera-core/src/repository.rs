//! Repository abstraction queried through [`Criteria`].

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::criteria::{Criteria, CriteriaPage};
use crate::error::DomainError;
use crate::unit_of_work::RepositoryContext;

/// Persistence for one aggregate type. Writes may join a unit of work by
/// passing its context; without one they are applied immediately.
#[async_trait]
pub trait Repository<A: Aggregate>: Send + Sync {
    /// The unit-of-work context this backend accepts.
    type Context: RepositoryContext;

    /// Loads an aggregate by id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<A>, DomainError>;

    /// Returns the page of aggregates matching the criteria.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the criteria cannot be
    /// converted, or `DomainError::Infrastructure` on storage failure.
    async fn find_by_criteria(&self, criteria: &Criteria) -> Result<CriteriaPage<A>, DomainError>;

    /// Counts aggregates matching the criteria, ignoring pagination.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::find_by_criteria`].
    async fn count_by_criteria(&self, criteria: &Criteria) -> Result<u64, DomainError>;

    /// Inserts or replaces the aggregate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the context is no longer
    /// active, or `DomainError::Infrastructure` on storage failure.
    async fn save(&self, aggregate: &A, context: Option<&Self::Context>) -> Result<(), DomainError>;

    /// Removes the aggregate. Removing an unknown id is a no-op.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::save`].
    async fn remove(&self, id: Uuid, context: Option<&Self::Context>) -> Result<(), DomainError>;

    /// Returns `true` if an aggregate with this id exists.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
        Ok(self.find_by_id(id).await?.is_some())
    }
}

#[async_trait]
impl<A: Aggregate, R: Repository<A> + ?Sized> Repository<A> for Arc<R> {
    type Context = R::Context;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<A>, DomainError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_criteria(&self, criteria: &Criteria) -> Result<CriteriaPage<A>, DomainError> {
        (**self).find_by_criteria(criteria).await
    }

    async fn count_by_criteria(&self, criteria: &Criteria) -> Result<u64, DomainError> {
        (**self).count_by_criteria(criteria).await
    }

    async fn save(&self, aggregate: &A, context: Option<&Self::Context>) -> Result<(), DomainError> {
        (**self).save(aggregate, context).await
    }

    async fn remove(&self, id: Uuid, context: Option<&Self::Context>) -> Result<(), DomainError> {
        (**self).remove(id, context).await
    }

    async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
        (**self).exists(id).await
    }
}
