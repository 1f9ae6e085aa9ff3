//! Offset and keyset (cursor) pagination.

use super::cursor::CursorToken;
use crate::error::DomainError;

/// Resume point of a cursor page: the order value and id of the last record
/// already seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPosition {
    /// Order-field value of the last seen record, string-encoded.
    pub after: String,
    /// Id of the last seen record.
    pub tiebreaker_id: String,
}

impl CursorPosition {
    /// Creates a resume point.
    #[must_use]
    pub fn new(after: impl Into<String>, tiebreaker_id: impl Into<String>) -> Self {
        Self {
            after: after.into(),
            tiebreaker_id: tiebreaker_id.into(),
        }
    }
}

impl From<CursorToken> for CursorPosition {
    fn from(token: CursorToken) -> Self {
        Self {
            after: token.after,
            tiebreaker_id: token.tiebreaker_id,
        }
    }
}

/// How a result set is windowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    /// Skip `offset` records, take `limit`.
    Offset {
        /// Maximum number of records.
        limit: u64,
        /// Records to skip.
        offset: u64,
    },
    /// Take `limit` records strictly past `after` in the sort order.
    Cursor {
        /// Maximum number of records.
        limit: u64,
        /// Resume point; `None` for the first page.
        after: Option<CursorPosition>,
    },
}

impl Pagination {
    /// Offset pagination.
    #[must_use]
    pub fn offset(limit: u64, offset: u64) -> Self {
        Self::Offset { limit, offset }
    }

    /// First page of a cursor walk.
    #[must_use]
    pub fn first_page(limit: u64) -> Self {
        Self::Cursor { limit, after: None }
    }

    /// Cursor pagination resuming after the given position.
    #[must_use]
    pub fn after(limit: u64, position: CursorPosition) -> Self {
        Self::Cursor {
            limit,
            after: Some(position),
        }
    }

    /// Cursor pagination resuming from an opaque token returned in a
    /// previous page.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the token is malformed.
    pub fn cursor_from_token(limit: u64, token: &str) -> Result<Self, DomainError> {
        Ok(Self::after(limit, CursorToken::decode(token)?.into()))
    }

    /// Maximum number of records in the window.
    #[must_use]
    pub fn limit(&self) -> u64 {
        match self {
            Self::Offset { limit, .. } | Self::Cursor { limit, .. } => *limit,
        }
    }

    /// Returns `true` for cursor pagination.
    #[must_use]
    pub fn is_cursor(&self) -> bool {
        matches!(self, Self::Cursor { .. })
    }
}
