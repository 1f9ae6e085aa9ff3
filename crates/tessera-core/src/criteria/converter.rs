//! Translation of [`Criteria`] into a backend's native query form.

use crate::error::DomainError;

use super::Criteria;

/// Converts criteria into a backend-native query. Each storage backend has
/// exactly one implementation.
pub trait CriteriaConverter {
    /// The native query produced.
    type Query;

    /// Translates the criteria.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the criteria cannot be
    /// expressed for this backend (for example an undeclared field).
    fn convert(&self, criteria: &Criteria) -> Result<Self::Query, DomainError>;
}
