//! Domain error types.

use thiserror::Error;

/// Boxed native cause carried by infrastructure failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type shared by the criteria model, repositories, units of
/// work and the outbox.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input rejected before any I/O (criteria construction,
    /// aggregate validation, misuse of a completed repository context).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Application-level uniqueness violation detected before writing.
    #[error("{field} '{value}' already exists")]
    AlreadyExists {
        /// The field that must be unique.
        field: String,
        /// The attempted value.
        value: String,
    },

    /// The caller expected exactly one result and got none.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was requested.
        entity: String,
        /// Identifier or lookup value that matched nothing.
        id: String,
    },

    /// A storage or transport failure. The message never contains
    /// backend-specific text; the native error is kept as the source.
    #[error("storage unavailable during {operation} of {subject}")]
    Infrastructure {
        /// The attempted operation (`save`, `find_by_criteria`, ...).
        operation: String,
        /// The subject of the operation (an id or a collection name).
        subject: String,
        /// The native cause.
        #[source]
        source: BoxError,
    },
}

impl DomainError {
    /// Builds an `InvalidArgument` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Builds an `AlreadyExists` error for the given field and value.
    pub fn already_exists(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AlreadyExists {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Builds a `NotFound` error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Wraps a native failure into `Infrastructure`.
    pub fn infrastructure(
        operation: impl Into<String>,
        subject: impl ToString,
        cause: impl Into<BoxError>,
    ) -> Self {
        Self::Infrastructure {
            operation: operation.into(),
            subject: subject.to_string(),
            source: cause.into(),
        }
    }

    /// Returns `true` for storage/transport failures.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Infrastructure { .. })
    }
}
