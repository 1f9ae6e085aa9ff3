//! Embedded document store.
//!
//! Collections are vectors of JSON documents in insertion order, keyed by
//! their `id` field. Reads and direct writes go through [`DocumentStore`];
//! a [`DocumentSession`] stages writes and applies them in one step on
//! commit, so readers never observe a partially applied transaction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use thiserror::Error;

use crate::matcher;

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The filter document is malformed or uses unsupported syntax.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A `$regex` pattern failed to compile.
    #[error(transparent)]
    InvalidRegex(#[from] regex::Error),

    /// A document has no string `id` field.
    #[error("document has no string id field")]
    MissingId,

    /// The session was already committed or aborted.
    #[error("session is no longer active")]
    SessionClosed,

    /// The store is not accepting requests.
    #[error("document store unavailable")]
    Unavailable,
}

/// Sort direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending; nulls first.
    Ascending,
    /// Descending; nulls last.
    Descending,
}

/// Options of a `find` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Sort keys, most significant first. Empty keeps insertion order.
    pub sort: Vec<(String, SortDirection)>,
    /// Documents to skip after sorting.
    pub skip: Option<u64>,
    /// Maximum number of documents returned.
    pub limit: Option<u64>,
}

type Collections = HashMap<String, Vec<Value>>;

/// A staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert or replace the document with this id.
    Upsert {
        /// Target collection.
        collection: String,
        /// Document id.
        id: String,
        /// Full replacement document.
        document: Value,
    },
    /// Delete the document with this id, if present.
    Delete {
        /// Target collection.
        collection: String,
        /// Document id.
        id: String,
    },
}

#[derive(Debug, Default)]
struct Inner {
    collections: RwLock<Collections>,
    unavailable: AtomicBool,
}

/// Handle to an embedded document store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

fn document_id(document: &Value) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

fn apply(collections: &mut Collections, op: WriteOp) {
    match op {
        WriteOp::Upsert {
            collection,
            id,
            document,
        } => {
            let documents = collections.entry(collection).or_default();
            match documents
                .iter_mut()
                .find(|d| document_id(d) == Some(id.as_str()))
            {
                Some(existing) => *existing = document,
                None => documents.push(document),
            }
        }
        WriteOp::Delete { collection, id } => {
            if let Some(documents) = collections.get_mut(&collection) {
                documents.retain(|d| document_id(d) != Some(id.as_str()));
            }
        }
    }
}

impl DocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: while unavailable every operation fails with
    /// [`DocumentError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DocumentError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(DocumentError::Unavailable);
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, DocumentError> {
        self.check_available()?;
        Ok(self
            .inner
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, DocumentError> {
        self.check_available()?;
        Ok(self
            .inner
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the documents matching `filter`, sorted, skipped and limited
    /// per `options`.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::InvalidFilter` for unsupported filter syntax
    /// or `DocumentError::Unavailable` during an outage.
    pub fn find(
        &self,
        collection: &str,
        filter: &Value,
        options: &FindOptions,
    ) -> Result<Vec<Value>, DocumentError> {
        let collections = self.read()?;
        let mut found = Vec::new();
        for document in collections.get(collection).into_iter().flatten() {
            if matcher::matches(document, filter)? {
                found.push(document.clone());
            }
        }
        drop(collections);
        if !options.sort.is_empty() {
            found.sort_by(|a, b| matcher::compare_documents(a, b, &options.sort));
        }
        let skip = options
            .skip
            .map_or(0, |s| usize::try_from(s).unwrap_or(usize::MAX));
        let limit = options
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(found.into_iter().skip(skip).take(limit).collect())
    }

    /// Returns the document with the given id.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Unavailable` during an outage.
    pub fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, DocumentError> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| document_id(d) == Some(id)))
            .cloned())
    }

    /// Counts the documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::find`].
    pub fn count(&self, collection: &str, filter: &Value) -> Result<u64, DocumentError> {
        let collections = self.read()?;
        let mut count = 0;
        for document in collections.get(collection).into_iter().flatten() {
            if matcher::matches(document, filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Inserts or replaces a document, keyed by its `id` field.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::MissingId` if the document has no string
    /// `id`, or `DocumentError::Unavailable` during an outage.
    pub fn replace_one(&self, collection: &str, document: Value) -> Result<(), DocumentError> {
        let op = upsert_op(collection, document)?;
        apply(&mut *self.write()?, op);
        Ok(())
    }

    /// Deletes the document with the given id, if present.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Unavailable` during an outage.
    pub fn delete_one(&self, collection: &str, id: &str) -> Result<(), DocumentError> {
        apply(
            &mut *self.write()?,
            WriteOp::Delete {
                collection: collection.to_owned(),
                id: id.to_owned(),
            },
        );
        Ok(())
    }

    /// Starts a session with its own transaction.
    #[must_use]
    pub fn start_session(&self) -> DocumentSession {
        DocumentSession {
            store: self.clone(),
            staged: Some(Vec::new()),
        }
    }
}

fn upsert_op(collection: &str, document: Value) -> Result<WriteOp, DocumentError> {
    let id = document_id(&document)
        .ok_or(DocumentError::MissingId)?
        .to_owned();
    Ok(WriteOp::Upsert {
        collection: collection.to_owned(),
        id,
        document,
    })
}

/// A transaction on the store. Staged writes are invisible until
/// [`DocumentSession::commit_transaction`]; dropping the session discards
/// them.
#[derive(Debug)]
pub struct DocumentSession {
    store: DocumentStore,
    staged: Option<Vec<WriteOp>>,
}

impl DocumentSession {
    fn staged(&mut self) -> Result<&mut Vec<WriteOp>, DocumentError> {
        self.staged.as_mut().ok_or(DocumentError::SessionClosed)
    }

    /// Stages an upsert.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::MissingId` for a document without id, or
    /// `DocumentError::SessionClosed` after commit or abort.
    pub fn replace_one(&mut self, collection: &str, document: Value) -> Result<(), DocumentError> {
        let op = upsert_op(collection, document)?;
        self.staged()?.push(op);
        Ok(())
    }

    /// Stages a delete.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::SessionClosed` after commit or abort.
    pub fn delete_one(&mut self, collection: &str, id: &str) -> Result<(), DocumentError> {
        self.staged()?.push(WriteOp::Delete {
            collection: collection.to_owned(),
            id: id.to_owned(),
        });
        Ok(())
    }

    /// Number of staged writes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.staged.as_ref().map_or(0, Vec::len)
    }

    /// Applies every staged write under one lock acquisition.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::SessionClosed` if already completed, or
    /// `DocumentError::Unavailable` during an outage (the staged writes are
    /// then discarded).
    pub fn commit_transaction(&mut self) -> Result<(), DocumentError> {
        let staged = self.staged.take().ok_or(DocumentError::SessionClosed)?;
        let mut collections = self.store.write()?;
        for op in staged {
            apply(&mut collections, op);
        }
        Ok(())
    }

    /// Discards every staged write. Aborting twice is a no-op.
    pub fn abort_transaction(&mut self) {
        self.staged = None;
    }
}
