//! Backend-agnostic query description: filters, order and pagination.
//!
//! A [`Criteria`] combines AND-ed [`Filters`], an optional [`Order`] and an
//! optional [`Pagination`]. Every backend's [`CriteriaConverter`] must
//! return the same records in the same order for the same criteria.

pub mod converter;
pub mod cursor;
pub mod filter;
pub mod order;
pub mod page;
pub mod pagination;
pub mod value;

pub use converter::CriteriaConverter;
pub use cursor::CursorToken;
pub use filter::{Filter, FilterField, FilterOperator, FilterValue, Filters};
pub use order::{Order, OrderType};
pub use page::CriteriaPage;
pub use pagination::{CursorPosition, Pagination};

use crate::error::DomainError;

/// Filters, order and pagination for a repository query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    filters: Filters,
    order: Order,
    pagination: Option<Pagination>,
    with_total: bool,
}

impl Criteria {
    /// Starts building criteria.
    #[must_use]
    pub fn builder() -> CriteriaBuilder {
        CriteriaBuilder::default()
    }

    /// Matches every record, unordered and unpaginated.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Creates criteria from parts.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if cursor pagination is
    /// requested without an order.
    pub fn new(
        filters: Filters,
        order: Order,
        pagination: Option<Pagination>,
    ) -> Result<Self, DomainError> {
        let criteria = Self {
            filters,
            order,
            pagination,
            with_total: false,
        };
        criteria.validate()?;
        Ok(criteria)
    }

    fn validate(&self) -> Result<(), DomainError> {
        if matches!(self.pagination, Some(Pagination::Cursor { .. })) && !self.order.has_order() {
            return Err(DomainError::invalid(
                "cursor pagination requires an order field and direction",
            ));
        }
        Ok(())
    }

    /// The AND-combined filters.
    #[must_use]
    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// The requested order.
    #[must_use]
    pub fn order(&self) -> &Order {
        &self.order
    }

    /// The requested window, if any.
    #[must_use]
    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    /// Whether the caller asked for a total count alongside the page.
    #[must_use]
    pub fn with_total(&self) -> bool {
        self.with_total
    }

    /// The same filters without pagination or ordering, as used for
    /// counting.
    #[must_use]
    pub fn without_pagination(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            order: Order::none(),
            pagination: None,
            with_total: false,
        }
    }
}

/// Builder for [`Criteria`]. Errors from individual steps are reported by
/// [`CriteriaBuilder::build`].
#[derive(Debug, Default)]
pub struct CriteriaBuilder {
    filters: Filters,
    order: Order,
    pagination: Option<Pagination>,
    with_total: bool,
    error: Option<DomainError>,
}

impl CriteriaBuilder {
    /// Adds a filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a filter from its parts.
    #[must_use]
    pub fn filter_by(
        mut self,
        field: impl AsRef<str>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        match Filter::new(field, operator, value) {
            Ok(filter) => self.filters.push(filter),
            Err(e) => self.record(e),
        }
        self
    }

    /// Adds a filter from a textual operator token.
    #[must_use]
    pub fn filter_parsed(
        mut self,
        field: impl AsRef<str>,
        operator: &str,
        value: impl Into<String>,
    ) -> Self {
        match Filter::parse(field, operator, value) {
            Ok(filter) => self.filters.push(filter),
            Err(e) => self.record(e),
        }
        self
    }

    /// Sets the order.
    #[must_use]
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Sets the pagination.
    #[must_use]
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Offset pagination.
    #[must_use]
    pub fn offset(self, limit: u64, offset: u64) -> Self {
        self.paginate(Pagination::offset(limit, offset))
    }

    /// Requests a total count in the result envelope.
    #[must_use]
    pub fn with_total(mut self) -> Self {
        self.with_total = true;
        self
    }

    fn record(&mut self, error: DomainError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Validates and builds the criteria.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if a filter was malformed or
    /// cursor pagination was requested without an order.
    pub fn build(self) -> Result<Criteria, DomainError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let criteria = Criteria {
            filters: self.filters,
            order: self.order,
            pagination: self.pagination,
            with_total: self.with_total,
        };
        criteria.validate()?;
        Ok(criteria)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use super::*;
    use crate::aggregate::Aggregate;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: Uuid,
        rank: i64,
    }

    impl Aggregate for Row {
        const COLLECTION: &'static str = "rows";

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn rows(n: i64) -> Vec<Row> {
        (0..n)
            .map(|rank| Row {
                id: Uuid::new_v4(),
                rank,
            })
            .collect()
    }

    #[test]
    fn test_cursor_without_order_is_rejected() {
        // Arrange & Act
        let result = Criteria::builder()
            .paginate(Pagination::first_page(10))
            .build();

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn test_offset_without_order_is_accepted() {
        let criteria = Criteria::builder().offset(10, 0).build().unwrap();

        assert_eq!(criteria.pagination(), Some(&Pagination::offset(10, 0)));
    }

    #[test]
    fn test_unknown_operator_fails_build() {
        let result = Criteria::builder()
            .filter_parsed("status", "LIKE", "a%")
            .order(Order::asc("name"))
            .build();

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn test_without_pagination_keeps_filters_only() {
        let criteria = Criteria::builder()
            .filter_by("status", FilterOperator::Equal, "active")
            .order(Order::desc("createdAt"))
            .offset(5, 10)
            .with_total()
            .build()
            .unwrap();

        let counting = criteria.without_pagination();

        assert_eq!(counting.filters(), criteria.filters());
        assert!(counting.pagination().is_none());
        assert!(!counting.order().has_order());
        assert!(!counting.with_total());
    }

    #[test]
    fn test_from_window_trims_lookahead_and_sets_cursor() {
        // Arrange
        let criteria = Criteria::builder()
            .order(Order::asc("rank"))
            .paginate(Pagination::first_page(3))
            .build()
            .unwrap();
        let fetched = rows(4);
        let third = fetched[2].clone();

        // Act
        let page = CriteriaPage::from_window(fetched, &criteria, None);

        // Assert
        assert_eq!(page.len(), 3);
        assert!(page.has_next);
        let token = CursorToken::decode(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(token.after, "2");
        assert_eq!(token.tiebreaker_id, third.id.to_string());
    }

    #[test]
    fn test_from_window_without_more_rows_has_no_cursor() {
        let criteria = Criteria::builder()
            .order(Order::asc("rank"))
            .paginate(Pagination::first_page(5))
            .build()
            .unwrap();

        let page = CriteriaPage::from_window(rows(2), &criteria, Some(2));

        assert_eq!(page.len(), 2);
        assert!(!page.has_next);
        assert_eq!(page.next_cursor, None);
        assert_eq!(page.total, Some(2));
    }

    #[test]
    fn test_from_window_offset_sets_has_next_without_cursor() {
        let criteria = Criteria::builder().offset(2, 0).build().unwrap();

        let page = CriteriaPage::from_window(rows(3), &criteria, None);

        assert_eq!(page.len(), 2);
        assert!(page.has_next);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_from_window_zero_limit_returns_no_items() {
        let criteria = Criteria::builder().offset(0, 0).build().unwrap();

        let page = CriteriaPage::from_window(rows(1), &criteria, None);

        assert!(page.is_empty());
    }
}
