//! Result envelope of a criteria query.

use crate::aggregate::Aggregate;

use super::Criteria;
use super::cursor::CursorToken;
use super::value::{json_text, lookup_path};

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaPage<T> {
    /// Records in the page, in sort order.
    pub items: Vec<T>,
    /// Total matching records ignoring pagination, when requested.
    pub total: Option<u64>,
    /// Whether more records follow this page.
    pub has_next: bool,
    /// Token resuming a cursor walk after this page.
    pub next_cursor: Option<String>,
}

impl<T> CriteriaPage<T> {
    /// A page holding every record, with nothing after it.
    #[must_use]
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            total: None,
            has_next: false,
            next_cursor: None,
        }
    }

    /// Converts the items, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CriteriaPage<U> {
        CriteriaPage {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            has_next: self.has_next,
            next_cursor: self.next_cursor,
        }
    }

    /// Number of records in the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the page holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<A: Aggregate> CriteriaPage<A> {
    /// Builds a page from a window fetched with one record of look-ahead
    /// (`limit + 1` rows). Trims the look-ahead, sets `has_next` and, for
    /// cursor pagination, the token resuming after the last record.
    #[must_use]
    pub fn from_window(mut fetched: Vec<A>, criteria: &Criteria, total: Option<u64>) -> Self {
        let Some(pagination) = criteria.pagination() else {
            return Self {
                total,
                ..Self::complete(fetched)
            };
        };
        let limit = usize::try_from(pagination.limit()).unwrap_or(usize::MAX);
        let has_next = fetched.len() > limit;
        fetched.truncate(limit);
        let next_cursor = if has_next && pagination.is_cursor() {
            fetched
                .last()
                .and_then(|last| cursor_for(last, &criteria.order().order_by))
                .map(|token| token.encode())
        } else {
            None
        };
        Self {
            items: fetched,
            total,
            has_next,
            next_cursor,
        }
    }
}

/// Cursor token positioned on `item` for the given order field.
#[must_use]
pub fn cursor_for<A: Aggregate>(item: &A, order_by: &str) -> Option<CursorToken> {
    let document = serde_json::to_value(item).ok()?;
    let after = lookup_path(&document, order_by).and_then(json_text)?;
    Some(CursorToken::new(after, item.id().to_string()))
}
