//! Unit of work: groups repository writes into one atomic commit.
//!
//! A [`UnitOfWork`] hands out a [`RepositoryContext`], a cheap-clone handle
//! that every repository taking part in the work receives explicitly.
//! Contexts are single-use. Dropping every clone of an active context rolls
//! it back, so a cancelled or timed-out unit of work never commits.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::DomainError;

/// Lifecycle of a repository context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Accepting writes.
    Active,
    /// Writes are durable.
    Committed,
    /// Writes were discarded.
    RolledBack,
}

/// Atomic lifecycle flag shared by the backends' context implementations.
#[derive(Debug)]
pub struct ContextStatus(AtomicU8);

impl Default for ContextStatus {
    fn default() -> Self {
        Self(AtomicU8::new(0))
    }
}

impl ContextStatus {
    /// Current state.
    #[must_use]
    pub fn state(&self) -> ContextState {
        match self.0.load(Ordering::Acquire) {
            0 => ContextState::Active,
            1 => ContextState::Committed,
            _ => ContextState::RolledBack,
        }
    }

    /// Returns `true` while the context accepts writes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == ContextState::Active
    }

    /// Fails unless the context is active.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a completed context.
    pub fn ensure_active(&self) -> Result<(), DomainError> {
        match self.state() {
            ContextState::Active => Ok(()),
            state => Err(DomainError::invalid(format!(
                "repository context is no longer active ({state:?})"
            ))),
        }
    }

    /// Moves `Active` to `to`. Returns `false` when the context was
    /// already completed.
    pub fn complete(&self, to: ContextState) -> bool {
        let target = match to {
            ContextState::Active => return false,
            ContextState::Committed => 1,
            ContextState::RolledBack => 2,
        };
        self.0
            .compare_exchange(0, target, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Checks whether a commit may proceed. `Ok(false)` means the context
    /// was already committed and the call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` after a rollback.
    pub fn check_commit(&self) -> Result<bool, DomainError> {
        match self.state() {
            ContextState::Active => Ok(true),
            ContextState::Committed => Ok(false),
            ContextState::RolledBack => Err(DomainError::invalid(
                "cannot commit a rolled back repository context",
            )),
        }
    }
}

/// Handle to the transactional scope of a unit of work.
#[async_trait]
pub trait RepositoryContext: Clone + Send + Sync + 'static {
    /// Makes every write performed through this context durable.
    /// Committing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` after a rollback, or
    /// `DomainError::Infrastructure` if the backend fails to commit.
    async fn commit(&self) -> Result<(), DomainError>;

    /// Discards every write performed through this context. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the backend fails to roll
    /// back.
    async fn rollback(&self) -> Result<(), DomainError>;

    /// Returns `true` while the context accepts writes.
    fn is_active(&self) -> bool;
}

/// Factory of repository contexts with commit-or-rollback helpers.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// The context handed to repositories.
    type Context: RepositoryContext;

    /// Opens a new context.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the backend cannot start a
    /// transaction.
    async fn begin(&self) -> Result<Self::Context, DomainError>;

    /// Runs `work` inside a fresh context. Commits when it returns `Ok`;
    /// rolls back and returns its error unchanged otherwise.
    ///
    /// # Errors
    ///
    /// Returns the error of `work`, or the begin/commit failure converted
    /// into `E`.
    async fn run<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        T: Send,
        E: From<DomainError> + Send,
        F: FnOnce(Self::Context) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let context = self.begin().await?;
        match work(context.clone()).await {
            Ok(value) => {
                context.commit().await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = context.rollback().await {
                    warn!(error = %rollback_error, "rollback after failed unit of work failed");
                }
                Err(error)
            }
        }
    }

    /// Like [`UnitOfWork::run`], but rolls back and fails with
    /// `DomainError::Infrastructure { operation: "unit_of_work", .. }` when
    /// `work` has not finished within `deadline`.
    ///
    /// # Errors
    ///
    /// Returns the error of `work`, a begin/commit failure, or the
    /// deadline failure, converted into `E`.
    async fn run_with_deadline<T, E, F, Fut>(&self, deadline: Duration, work: F) -> Result<T, E>
    where
        T: Send,
        E: From<DomainError> + Send,
        F: FnOnce(Self::Context) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let context = self.begin().await?;
        let outcome = tokio::time::timeout(deadline, work(context.clone())).await;
        match outcome {
            Ok(Ok(value)) => {
                context.commit().await?;
                Ok(value)
            }
            Ok(Err(error)) => {
                if let Err(rollback_error) = context.rollback().await {
                    warn!(error = %rollback_error, "rollback after failed unit of work failed");
                }
                Err(error)
            }
            Err(elapsed) => {
                if let Err(rollback_error) = context.rollback().await {
                    warn!(error = %rollback_error, "rollback after unit of work deadline failed");
                }
                warn!(deadline_ms = deadline.as_millis(), "unit of work exceeded its deadline");
                Err(DomainError::infrastructure("unit_of_work", "deadline", elapsed).into())
            }
        }
    }
}
