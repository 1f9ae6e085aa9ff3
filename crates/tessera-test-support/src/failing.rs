//! Repository wrapper that injects save failures.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tessera_core::aggregate::Aggregate;
use tessera_core::criteria::{Criteria, CriteriaPage};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use uuid::Uuid;

/// Delegates to `inner` but fails every `save` once `allowed` saves have
/// gone through. Reads and removals are never affected.
#[derive(Debug)]
pub struct FailingSaves<R> {
    inner: R,
    allowed: usize,
    attempted: AtomicUsize,
}

impl<R> FailingSaves<R> {
    /// Fails every save.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self::after(inner, 0)
    }

    /// Lets the first `allowed` saves through, then fails.
    #[must_use]
    pub fn after(inner: R, allowed: usize) -> Self {
        Self {
            inner,
            allowed,
            attempted: AtomicUsize::new(0),
        }
    }

    /// The wrapped repository.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of `save` calls received.
    pub fn attempted(&self) -> usize {
        self.attempted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<A: Aggregate, R: Repository<A>> Repository<A> for FailingSaves<R> {
    type Context = R::Context;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<A>, DomainError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_criteria(&self, criteria: &Criteria) -> Result<CriteriaPage<A>, DomainError> {
        self.inner.find_by_criteria(criteria).await
    }

    async fn count_by_criteria(&self, criteria: &Criteria) -> Result<u64, DomainError> {
        self.inner.count_by_criteria(criteria).await
    }

    async fn save(&self, aggregate: &A, context: Option<&R::Context>) -> Result<(), DomainError> {
        let attempt = self.attempted.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.allowed {
            return Err(DomainError::infrastructure(
                "save",
                aggregate.id(),
                "injected save failure",
            ));
        }
        self.inner.save(aggregate, context).await
    }

    async fn remove(&self, id: Uuid, context: Option<&R::Context>) -> Result<(), DomainError> {
        self.inner.remove(id, context).await
    }

    async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
        self.inner.exists(id).await
    }
}
