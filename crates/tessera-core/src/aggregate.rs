//! Aggregate abstractions shared by every repository backend.

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;

/// Storage type of a queryable field. Every backend types filter values,
/// cursor values and stored values by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, compared byte-wise.
    Text,
    /// Integer or floating point number.
    Number,
    /// `true` / `false`.
    Boolean,
    /// RFC 3339 timestamp.
    Timestamp,
    /// UUID rendered as text.
    Uuid,
}

/// A field of an aggregate's serialized form that criteria may filter or
/// sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryableField {
    /// Field path in the serialized (camelCase) form, dotted for nesting.
    pub name: &'static str,
    /// Declared type.
    pub kind: FieldKind,
}

impl QueryableField {
    /// Declares a queryable field.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A persistable aggregate. Its serialized form must contain an `id` field
/// equal to [`Aggregate::id`].
pub trait Aggregate: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Collection (table) name the aggregate is stored in.
    const COLLECTION: &'static str;

    /// Returns the aggregate identifier.
    fn id(&self) -> Uuid;

    /// Fields criteria may address, besides `id`.
    #[must_use]
    fn queryable_fields() -> &'static [QueryableField] {
        &[]
    }
}

/// The declared queryable fields of one aggregate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    collection: &'static str,
    fields: &'static [QueryableField],
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            collection: "",
            fields: &[],
        }
    }
}

impl FieldSchema {
    /// Schema of `A`.
    #[must_use]
    pub fn of<A: Aggregate>() -> Self {
        Self {
            collection: A::COLLECTION,
            fields: A::queryable_fields(),
        }
    }

    /// Returns `true` if the aggregate declares at least one field.
    #[must_use]
    pub fn is_declared(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Declared kind of `field`. `id` is always a UUID. `Ok(None)` means the
    /// aggregate declares no fields, so callers infer types from values.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the aggregate declares
    /// fields and `field` is not one of them.
    pub fn kind_of(&self, field: &str) -> Result<Option<FieldKind>, DomainError> {
        if field == "id" {
            return Ok(Some(FieldKind::Uuid));
        }
        if !self.is_declared() {
            return Ok(None);
        }
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| Some(f.kind))
            .ok_or_else(|| {
                DomainError::invalid(format!(
                    "field '{field}' is not queryable on {}",
                    self.collection
                ))
            })
    }
}

/// An aggregate that raises in-process domain events.
pub trait AggregateRoot: Aggregate {
    /// The event type this aggregate raises.
    type Event: DomainEvent;

    /// Takes the events raised since the last call.
    fn pull_domain_events(&mut self) -> Vec<Self::Event>;
}
