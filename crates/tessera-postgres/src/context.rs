//! Transaction-backed unit of work for `PostgreSQL`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Transaction};
use tessera_core::error::DomainError;
use tessera_core::unit_of_work::{ContextState, ContextStatus, RepositoryContext, UnitOfWork};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug)]
struct Shared {
    status: ContextStatus,
    transaction: Mutex<Option<Transaction<'static, Postgres>>>,
}

/// Shared handle to an open database transaction.
///
/// Writes issued through the context run inside the transaction. Dropping
/// the last handle of an active context drops the transaction, which rolls
/// it back.
#[derive(Debug, Clone)]
pub struct PgContext {
    shared: Arc<Shared>,
}

impl PgContext {
    fn new(transaction: Transaction<'static, Postgres>) -> Self {
        Self {
            shared: Arc::new(Shared {
                status: ContextStatus::default(),
                transaction: Mutex::new(Some(transaction)),
            }),
        }
    }

    /// Executes `query` inside the transaction and returns the affected
    /// row count.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the context is completed,
    /// or `DomainError::Infrastructure` if the statement fails.
    pub(crate) async fn execute(
        &self,
        operation: &str,
        subject: &str,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<u64, DomainError> {
        self.shared.status.ensure_active()?;
        let mut guard = self.shared.transaction.lock().await;
        let transaction = guard
            .as_mut()
            .ok_or_else(|| DomainError::invalid("repository context is no longer active"))?;
        let result = query
            .execute(&mut **transaction)
            .await
            .map_err(|e| DomainError::infrastructure(operation, subject, e))?;
        Ok(result.rows_affected())
    }

    async fn take_transaction(&self) -> Option<Transaction<'static, Postgres>> {
        self.shared.transaction.lock().await.take()
    }
}

#[async_trait]
impl RepositoryContext for PgContext {
    async fn commit(&self) -> Result<(), DomainError> {
        if !self.shared.status.check_commit()? {
            return Ok(());
        }
        let Some(transaction) = self.take_transaction().await else {
            return self.shared.status.check_commit().map(|_| ());
        };
        match transaction.commit().await {
            Ok(()) => {
                self.shared.status.complete(ContextState::Committed);
                debug!("transaction committed");
                Ok(())
            }
            Err(e) => {
                self.shared.status.complete(ContextState::RolledBack);
                warn!(error = %e, "transaction commit failed");
                Err(DomainError::infrastructure("commit", "transaction", e))
            }
        }
    }

    async fn rollback(&self) -> Result<(), DomainError> {
        if !self.shared.status.complete(ContextState::RolledBack) {
            return Ok(());
        }
        if let Some(transaction) = self.take_transaction().await {
            transaction
                .rollback()
                .await
                .map_err(|e| DomainError::infrastructure("rollback", "transaction", e))?;
        }
        debug!("transaction rolled back");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.shared.status.is_active()
    }
}

/// Opens a [`PgContext`] per unit of work.
#[derive(Debug, Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    /// Creates a unit of work over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    type Context = PgContext;

    async fn begin(&self) -> Result<PgContext, DomainError> {
        let transaction = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::infrastructure("begin", "transaction", e))?;
        Ok(PgContext::new(transaction))
    }
}
