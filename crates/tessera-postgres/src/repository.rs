//! `PostgreSQL` implementation of the `Repository` trait.

use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tessera_core::aggregate::Aggregate;
use tessera_core::criteria::{Criteria, CriteriaPage};
use tessera_core::error::DomainError;
use tessera_core::repository::Repository;
use tracing::debug;
use uuid::Uuid;

use crate::context::PgContext;
use crate::converter::{SqlCriteriaConverter, decode_row};
use crate::schema::quote_ident;

/// Repository storing each aggregate as a JSONB document in the table
/// named by [`Aggregate::COLLECTION`].
#[derive(Debug)]
pub struct PgRepository<A> {
    pool: PgPool,
    converter: SqlCriteriaConverter,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> Clone for PgRepository<A> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            converter: self.converter,
            _aggregate: PhantomData,
        }
    }
}

impl<A: Aggregate> PgRepository<A> {
    /// Creates a repository over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            converter: SqlCriteriaConverter::for_aggregate::<A>(),
            _aggregate: PhantomData,
        }
    }
}

#[async_trait]
impl<A: Aggregate> Repository<A> for PgRepository<A> {
    type Context = PgContext;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<A>, DomainError> {
        let sql = format!(
            "SELECT document FROM {} WHERE id = $1",
            quote_ident(A::COLLECTION)
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::infrastructure("find_by_id", id, e))?;
        row.as_ref().map(|row| decode_row(row, "find_by_id")).transpose()
    }

    async fn find_by_criteria(&self, criteria: &Criteria) -> Result<CriteriaPage<A>, DomainError> {
        let page = self.converter.query(&self.pool, criteria).await?;
        debug!(collection = A::COLLECTION, returned = page.items.len(), "criteria query ran");
        Ok(page)
    }

    async fn count_by_criteria(&self, criteria: &Criteria) -> Result<u64, DomainError> {
        self.converter.count::<A>(&self.pool, criteria).await
    }

    async fn save(&self, aggregate: &A, context: Option<&PgContext>) -> Result<(), DomainError> {
        let id = aggregate.id();
        let document = serde_json::to_value(aggregate)
            .map_err(|e| DomainError::infrastructure("save", id, e))?;
        let sql = format!(
            "INSERT INTO {} (id, document) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document",
            quote_ident(A::COLLECTION)
        );
        let query = sqlx::query(&sql).bind(id).bind(Json(document));
        match context {
            Some(context) => {
                context.execute("save", &id.to_string(), query).await?;
            }
            None => {
                query
                    .execute(&self.pool)
                    .await
                    .map_err(|e| DomainError::infrastructure("save", id, e))?;
            }
        }
        debug!(collection = A::COLLECTION, %id, transactional = context.is_some(), "saved row");
        Ok(())
    }

    async fn remove(&self, id: Uuid, context: Option<&PgContext>) -> Result<(), DomainError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", quote_ident(A::COLLECTION));
        let query = sqlx::query(&sql).bind(id);
        match context {
            Some(context) => {
                context.execute("remove", &id.to_string(), query).await?;
            }
            None => {
                query
                    .execute(&self.pool)
                    .await
                    .map_err(|e| DomainError::infrastructure("remove", id, e))?;
            }
        }
        debug!(collection = A::COLLECTION, %id, transactional = context.is_some(), "removed row");
        Ok(())
    }
}
