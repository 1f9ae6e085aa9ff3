//! Session-backed unit of work for the document store.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tessera_core::error::DomainError;
use tessera_core::unit_of_work::{ContextState, ContextStatus, RepositoryContext, UnitOfWork};
use tracing::{debug, warn};

use crate::store::{DocumentError, DocumentSession, DocumentStore};

#[derive(Debug)]
struct Shared {
    status: ContextStatus,
    session: Mutex<Option<DocumentSession>>,
}

/// Shared handle to a document-store session. Writes are staged in the
/// session and become visible together on commit; dropping the last handle
/// of an active context discards them.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    shared: Arc<Shared>,
}

impl DocumentContext {
    fn new(session: DocumentSession) -> Self {
        Self {
            shared: Arc::new(Shared {
                status: ContextStatus::default(),
                session: Mutex::new(Some(session)),
            }),
        }
    }

    /// Runs `stage` against the session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the context is completed,
    /// or `DomainError::Infrastructure` if staging fails.
    pub(crate) fn stage(
        &self,
        operation: &str,
        subject: &str,
        stage: impl FnOnce(&mut DocumentSession) -> Result<(), DocumentError>,
    ) -> Result<(), DomainError> {
        self.shared.status.ensure_active()?;
        let mut guard = self
            .shared
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let session = guard
            .as_mut()
            .ok_or_else(|| DomainError::invalid("repository context is no longer active"))?;
        stage(session).map_err(|e| DomainError::infrastructure(operation, subject, e))
    }

    fn take_session(&self) -> Option<DocumentSession> {
        self.shared
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[async_trait]
impl RepositoryContext for DocumentContext {
    async fn commit(&self) -> Result<(), DomainError> {
        if !self.shared.status.check_commit()? {
            return Ok(());
        }
        let Some(mut session) = self.take_session() else {
            return self.shared.status.check_commit().map(|_| ());
        };
        match session.commit_transaction() {
            Ok(()) => {
                self.shared.status.complete(ContextState::Committed);
                debug!("document session committed");
                Ok(())
            }
            Err(e) => {
                self.shared.status.complete(ContextState::RolledBack);
                warn!(error = %e, "document session commit failed; staged writes discarded");
                Err(DomainError::infrastructure("commit", "document session", e))
            }
        }
    }

    async fn rollback(&self) -> Result<(), DomainError> {
        if self.shared.status.complete(ContextState::RolledBack) {
            if let Some(mut session) = self.take_session() {
                session.abort_transaction();
            }
            debug!("document session rolled back");
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.shared.status.is_active()
    }
}

/// Opens a [`DocumentContext`] per unit of work.
#[derive(Debug, Clone)]
pub struct DocumentUnitOfWork {
    store: DocumentStore,
}

impl DocumentUnitOfWork {
    /// Creates a unit of work over `store`.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UnitOfWork for DocumentUnitOfWork {
    type Context = DocumentContext;

    async fn begin(&self) -> Result<DocumentContext, DomainError> {
        Ok(DocumentContext::new(self.store.start_session()))
    }
}
