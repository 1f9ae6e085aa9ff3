//! Document-store `Repository` implementation.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use tessera_core::aggregate::Aggregate;
use tessera_core::criteria::{Criteria, CriteriaPage};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use tracing::debug;
use uuid::Uuid;

use crate::context::DocumentContext;
use crate::converter::DocumentCriteriaConverter;
use crate::store::DocumentStore;

/// Repository storing each aggregate as one JSON document in the
/// collection named by [`Aggregate::COLLECTION`].
#[derive(Debug)]
pub struct DocumentRepository<A> {
    store: DocumentStore,
    converter: DocumentCriteriaConverter,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> Clone for DocumentRepository<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            converter: self.converter,
            _aggregate: PhantomData,
        }
    }
}

impl<A: Aggregate> DocumentRepository<A> {
    /// Creates a repository over `store`.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            converter: DocumentCriteriaConverter::for_aggregate::<A>(),
            _aggregate: PhantomData,
        }
    }

    fn to_document(aggregate: &A) -> Result<Value, DomainError> {
        serde_json::to_value(aggregate)
            .map_err(|e| DomainError::infrastructure("save", aggregate.id(), e))
    }
}

#[async_trait]
impl<A: Aggregate> Repository<A> for DocumentRepository<A> {
    type Context = DocumentContext;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<A>, DomainError> {
        let document = self
            .store
            .find_by_id(A::COLLECTION, &id.to_string())
            .map_err(|e| DomainError::infrastructure("find_by_id", id, e))?;
        document
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| DomainError::infrastructure("find_by_id", id, e))
    }

    async fn find_by_criteria(&self, criteria: &Criteria) -> Result<CriteriaPage<A>, DomainError> {
        self.converter.query(&self.store, criteria)
    }

    async fn count_by_criteria(&self, criteria: &Criteria) -> Result<u64, DomainError> {
        self.converter.count::<A>(&self.store, criteria)
    }

    async fn save(&self, aggregate: &A, context: Option<&DocumentContext>) -> Result<(), DomainError> {
        let id = aggregate.id();
        let document = Self::to_document(aggregate)?;
        let subject = id.to_string();
        match context {
            Some(context) => context.stage("save", &subject, |session| {
                session.replace_one(A::COLLECTION, document)
            })?,
            None => self
                .store
                .replace_one(A::COLLECTION, document)
                .map_err(|e| DomainError::infrastructure("save", id, e))?,
        }
        debug!(collection = A::COLLECTION, %id, staged = context.is_some(), "saved document");
        Ok(())
    }

    async fn remove(&self, id: Uuid, context: Option<&DocumentContext>) -> Result<(), DomainError> {
        let subject = id.to_string();
        match context {
            Some(context) => context.stage("remove", &subject, |session| {
                session.delete_one(A::COLLECTION, &subject)
            })?,
            None => self
                .store
                .delete_one(A::COLLECTION, &subject)
                .map_err(|e| DomainError::infrastructure("remove", id, e))?,
        }
        debug!(collection = A::COLLECTION, %id, staged = context.is_some(), "removed document");
        Ok(())
    }
}
