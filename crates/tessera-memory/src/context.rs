//! Snapshot-journal unit of work for in-memory repositories.
//!
//! Writes through a [`MemoryContext`] are applied immediately. The first
//! write to each repository records a snapshot of that repository's
//! contents; rollback restores the snapshots in reverse order. Writes made
//! outside the context between the snapshot and the rollback are lost, so
//! isolation is best effort.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tessera_core::error::DomainError;
use tessera_core::unit_of_work::{ContextState, ContextStatus, RepositoryContext, UnitOfWork};
use tracing::debug;

pub(crate) type Restore = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Journal {
    status: ContextStatus,
    entries: Mutex<Vec<(usize, Restore)>>,
}

impl Journal {
    fn restore_all(&self) {
        let entries = std::mem::take(
            &mut *self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for (_, restore) in entries.into_iter().rev() {
            restore();
        }
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        if self.status.complete(ContextState::RolledBack) {
            debug!("in-memory context dropped while active; rolling back");
            self.restore_all();
        }
    }
}

/// Shared handle to an in-memory unit of work.
#[derive(Clone, Default)]
pub struct MemoryContext {
    journal: Arc<Journal>,
}

impl std::fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryContext")
            .field("state", &self.journal.status.state())
            .finish_non_exhaustive()
    }
}

impl MemoryContext {
    /// Opens a new active context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a snapshot for the store identified by `store_key`, unless
    /// one was already recorded in this context.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the context is no longer
    /// active.
    pub(crate) fn journal(
        &self,
        store_key: usize,
        snapshot: impl FnOnce() -> Restore,
    ) -> Result<(), DomainError> {
        self.journal.status.ensure_active()?;
        let mut entries = self
            .journal
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !entries.iter().any(|(key, _)| *key == store_key) {
            entries.push((store_key, snapshot()));
        }
        Ok(())
    }
}

#[async_trait]
impl RepositoryContext for MemoryContext {
    async fn commit(&self) -> Result<(), DomainError> {
        if !self.journal.status.check_commit()? {
            return Ok(());
        }
        if self.journal.status.complete(ContextState::Committed) {
            self.journal
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            return Ok(());
        }
        // Lost a race with a concurrent completion; report its outcome.
        self.journal.status.check_commit().map(|_| ())
    }

    async fn rollback(&self) -> Result<(), DomainError> {
        if self.journal.status.complete(ContextState::RolledBack) {
            self.journal.restore_all();
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.journal.status.is_active()
    }
}

/// Opens [`MemoryContext`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryUnitOfWork;

impl MemoryUnitOfWork {
    /// Creates the unit of work.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    type Context = MemoryContext;

    async fn begin(&self) -> Result<MemoryContext, DomainError> {
        Ok(MemoryContext::new())
    }
}
