//! In-memory `Repository` implementation.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tessera_core::aggregate::Aggregate;
use tessera_core::criteria::{Criteria, CriteriaPage};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use tracing::debug;
use uuid::Uuid;

use crate::context::{MemoryContext, Restore};
use crate::converter::MemoryCriteriaConverter;

/// Repository keeping aggregates in insertion order in a shared vector.
/// Clones share the same store.
#[derive(Debug)]
pub struct MemoryRepository<A> {
    store: Arc<RwLock<Vec<A>>>,
    converter: MemoryCriteriaConverter,
}

impl<A> Clone for MemoryRepository<A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            converter: self.converter,
        }
    }
}

impl<A: Aggregate> Default for MemoryRepository<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Aggregate> MemoryRepository<A> {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    /// Creates a repository holding `items`.
    #[must_use]
    pub fn with_items(items: Vec<A>) -> Self {
        Self {
            store: Arc::new(RwLock::new(items)),
            converter: MemoryCriteriaConverter::for_aggregate::<A>(),
        }
    }

    /// Copy of every stored aggregate in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<A> {
        self.read().clone()
    }

    // Poisoning only means a panic happened while holding the lock; the
    // vector is never left half-updated by the operations below.
    fn read(&self) -> RwLockReadGuard<'_, Vec<A>> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<A>> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn join(&self, context: Option<&MemoryContext>) -> Result<(), DomainError> {
        let Some(context) = context else {
            return Ok(());
        };
        let store = Arc::clone(&self.store);
        let key = Arc::as_ptr(&self.store) as usize;
        context.journal(key, || -> Restore {
            let saved = self.read().clone();
            Box::new(move || {
                *store.write().unwrap_or_else(PoisonError::into_inner) = saved;
            })
        })
    }
}

#[async_trait]
impl<A: Aggregate> Repository<A> for MemoryRepository<A> {
    type Context = MemoryContext;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<A>, DomainError> {
        Ok(self.read().iter().find(|a| a.id() == id).cloned())
    }

    async fn find_by_criteria(&self, criteria: &Criteria) -> Result<CriteriaPage<A>, DomainError> {
        self.converter.query(&self.read(), criteria)
    }

    async fn count_by_criteria(&self, criteria: &Criteria) -> Result<u64, DomainError> {
        self.converter.count(&self.read(), criteria)
    }

    async fn save(&self, aggregate: &A, context: Option<&MemoryContext>) -> Result<(), DomainError> {
        self.join(context)?;
        let id = aggregate.id();
        let mut store = self.write();
        match store.iter_mut().find(|a| a.id() == id) {
            Some(existing) => *existing = aggregate.clone(),
            None => store.push(aggregate.clone()),
        }
        debug!(collection = A::COLLECTION, %id, "saved aggregate in memory");
        Ok(())
    }

    async fn remove(&self, id: Uuid, context: Option<&MemoryContext>) -> Result<(), DomainError> {
        self.join(context)?;
        self.write().retain(|a| a.id() != id);
        debug!(collection = A::COLLECTION, %id, "removed aggregate from memory");
        Ok(())
    }

    async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
        Ok(self.read().iter().any(|a| a.id() == id))
    }
}
