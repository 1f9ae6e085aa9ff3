//! Criteria evaluation over in-memory aggregates.
//!
//! The converter compiles [`Criteria`] into a [`MemoryQuery`]: a list of
//! predicates, an optional sort and a window. The query runs against
//! aggregates projected to their JSON form.
//!
//! Values are typed by the aggregate's declared [`FieldKind`]s. Aggregates
//! without declarations fall back to inference, where fields whose name ends
//! with `At`, `Date` or `Time` are treated as dates.

use std::cmp::Ordering;

use serde_json::Value;
use tessera_core::aggregate::{Aggregate, FieldKind, FieldSchema};
use tessera_core::criteria::value::{
    ScalarValue, compare_same_type, compare_values, json_text, lookup_path, typed_filter_value,
    typed_stored_value,
};
use tessera_core::criteria::{
    Criteria, CriteriaConverter, CriteriaPage, CursorPosition, FilterOperator, Pagination,
};
use tessera_core::error::DomainError;

/// A compiled filter condition.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPredicate {
    field: String,
    kind: Option<FieldKind>,
    operator: FilterOperator,
    raw: String,
    expected: ScalarValue,
}

impl MemoryPredicate {
    fn new(
        field: &str,
        kind: Option<FieldKind>,
        operator: FilterOperator,
        raw: &str,
    ) -> Result<Self, DomainError> {
        let expected = if operator.is_string_operator() {
            ScalarValue::Text(raw.to_owned())
        } else {
            typed_filter_value(kind, field, raw)?
        };
        Ok(Self {
            field: field.to_owned(),
            kind,
            operator,
            raw: raw.to_owned(),
            expected,
        })
    }

    /// Evaluates the condition against a projected record.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        let stored = lookup_path(document, &self.field).filter(|v| !v.is_null());
        let Some(stored) = stored else {
            return matches!(
                self.operator,
                FilterOperator::NotEqual | FilterOperator::NotContains
            );
        };
        match self.operator {
            FilterOperator::Contains => contains(stored, &self.raw),
            FilterOperator::NotContains => !contains(stored, &self.raw),
            FilterOperator::Equal => self.compare(stored) == Some(Ordering::Equal),
            FilterOperator::NotEqual => self.compare(stored) != Some(Ordering::Equal),
            FilterOperator::Gt => self.compare(stored) == Some(Ordering::Greater),
            FilterOperator::Lt => self.compare(stored) == Some(Ordering::Less),
        }
    }

    fn compare(&self, stored: &Value) -> Option<Ordering> {
        compare_same_type(
            &typed_stored_value(self.kind, &self.field, stored),
            &self.expected,
        )
    }
}

fn contains(stored: &Value, needle: &str) -> bool {
    json_text(stored).is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase()))
}

/// Keyset condition: records strictly past the resume point in the order
/// [`MemorySort`] produces. Records without a value never qualify.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCursor {
    field: String,
    kind: Option<FieldKind>,
    after: ScalarValue,
    tiebreaker_id: String,
    descending: bool,
}

impl MemoryCursor {
    fn new(
        field: &str,
        kind: Option<FieldKind>,
        position: &CursorPosition,
        descending: bool,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            field: field.to_owned(),
            kind,
            after: typed_filter_value(kind, field, &position.after)?,
            tiebreaker_id: position.tiebreaker_id.clone(),
            descending,
        })
    }

    /// Returns `true` if the record sorts strictly after the resume point.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        let Some(stored) = lookup_path(document, &self.field).filter(|v| !v.is_null()) else {
            return false;
        };
        let stored = typed_stored_value(self.kind, &self.field, stored);
        if stored.is_null() {
            return false;
        }
        let past = if self.descending {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        match compare_values(&stored, &self.after) {
            Ordering::Equal => {
                let id = lookup_path(document, "id").and_then(json_text).unwrap_or_default();
                id.as_str().cmp(self.tiebreaker_id.as_str()) == past
            }
            ordering => ordering == past,
        }
    }
}

/// Sort on one field with the record id as tiebreaker in the same
/// direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySort {
    field: String,
    kind: Option<FieldKind>,
    descending: bool,
}

impl MemorySort {
    /// Compares two projected records.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let key = |doc: &Value| {
            lookup_path(doc, &self.field)
                .map_or(ScalarValue::Null, |v| typed_stored_value(self.kind, &self.field, v))
        };
        let id = |doc: &Value| lookup_path(doc, "id").and_then(json_text).unwrap_or_default();
        let ordering = compare_values(&key(a), &key(b)).then_with(|| id(a).cmp(&id(b)));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Which slice of the sorted records to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryWindow {
    /// Everything.
    Unbounded,
    /// Skip `offset`, take `take`.
    Slice {
        /// Records to skip.
        offset: u64,
        /// Records to take, including the look-ahead row.
        take: u64,
    },
}

/// A compiled in-memory query.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryQuery {
    /// AND-combined filter conditions.
    pub predicates: Vec<MemoryPredicate>,
    /// Keyset condition for cursor pages after the first.
    pub cursor: Option<MemoryCursor>,
    /// Sort, when the criteria carry an order.
    pub sort: Option<MemorySort>,
    /// Window, with one row of look-ahead.
    pub window: MemoryWindow,
}

impl MemoryQuery {
    /// Returns `true` if the record passes every predicate and the cursor.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        self.predicates.iter().all(|p| p.matches(document))
            && self.cursor.as_ref().is_none_or(|c| c.matches(document))
    }

    /// Filters, sorts and windows the records.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if an aggregate cannot be
    /// projected to JSON.
    pub fn run<A: Aggregate>(&self, records: &[A]) -> Result<Vec<A>, DomainError> {
        let mut matched = project(records)?
            .into_iter()
            .filter(|(document, _)| self.matches(document))
            .collect::<Vec<_>>();
        if let Some(sort) = &self.sort {
            matched.sort_by(|(a, _), (b, _)| sort.compare(a, b));
        }
        let matched = matched.into_iter().map(|(_, record)| record.clone());
        Ok(match self.window {
            MemoryWindow::Unbounded => matched.collect(),
            MemoryWindow::Slice { offset, take } => matched
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(take).unwrap_or(usize::MAX))
                .collect(),
        })
    }

    /// Counts matching records.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryQuery::run`].
    pub fn count<A: Aggregate>(&self, records: &[A]) -> Result<u64, DomainError> {
        let matched = project(records)?
            .iter()
            .filter(|(document, _)| self.matches(document))
            .count();
        Ok(matched as u64)
    }
}

fn project<A: Aggregate>(records: &[A]) -> Result<Vec<(Value, &A)>, DomainError> {
    records
        .iter()
        .map(|record| {
            serde_json::to_value(record)
                .map(|document| (document, record))
                .map_err(|e| DomainError::infrastructure("project", record.id(), e))
        })
        .collect()
}

/// Converts criteria into [`MemoryQuery`] plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryCriteriaConverter {
    schema: FieldSchema,
}

impl CriteriaConverter for MemoryCriteriaConverter {
    type Query = MemoryQuery;

    fn convert(&self, criteria: &Criteria) -> Result<MemoryQuery, DomainError> {
        let predicates = criteria
            .filters()
            .iter()
            .map(|f| {
                let field = f.field.as_str();
                MemoryPredicate::new(field, self.schema.kind_of(field)?, f.operator, f.value.as_str())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let order = criteria.order();
        let sort = if order.has_order() {
            Some(MemorySort {
                field: order.order_by.clone(),
                kind: self.schema.kind_of(&order.order_by)?,
                descending: order.order_type.is_desc(),
            })
        } else {
            None
        };

        let (cursor, window) = match criteria.pagination() {
            None => (None, MemoryWindow::Unbounded),
            Some(Pagination::Offset { limit, offset }) => (
                None,
                MemoryWindow::Slice {
                    offset: *offset,
                    take: limit.saturating_add(1),
                },
            ),
            Some(Pagination::Cursor { limit, after }) => {
                let cursor = match after {
                    Some(position) => Some(MemoryCursor::new(
                        &order.order_by,
                        self.schema.kind_of(&order.order_by)?,
                        position,
                        order.order_type.is_desc(),
                    )?),
                    None => None,
                };
                (
                    cursor,
                    MemoryWindow::Slice {
                        offset: 0,
                        take: limit.saturating_add(1),
                    },
                )
            }
        };

        Ok(MemoryQuery {
            predicates,
            cursor,
            sort,
            window,
        })
    }
}

impl MemoryCriteriaConverter {
    /// Converter typing values by the fields `A` declares.
    #[must_use]
    pub fn for_aggregate<A: Aggregate>() -> Self {
        Self {
            schema: FieldSchema::of::<A>(),
        }
    }

    /// Runs the criteria against `records` and builds the page.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if a field is not queryable or
    /// a value does not fit its declared kind, and
    /// `DomainError::Infrastructure` if an aggregate cannot be projected to
    /// JSON.
    pub fn query<A: Aggregate>(
        &self,
        records: &[A],
        criteria: &Criteria,
    ) -> Result<CriteriaPage<A>, DomainError> {
        let window = self.convert(criteria)?.run(records)?;
        let total = if criteria.with_total() {
            Some(self.count(records, criteria)?)
        } else {
            None
        };
        Ok(CriteriaPage::from_window(window, criteria, total))
    }

    /// Counts records matching the criteria, ignoring pagination.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryCriteriaConverter::query`].
    pub fn count<A: Aggregate>(&self, records: &[A], criteria: &Criteria) -> Result<u64, DomainError> {
        self.convert(&criteria.without_pagination())?.count(records)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use tessera_core::aggregate::QueryableField;
    use tessera_core::criteria::{CursorToken, Order};
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Item {
        id: Uuid,
        name: String,
        value: Option<i64>,
        created_at: String,
    }

    impl Aggregate for Item {
        const COLLECTION: &'static str = "items";

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn item(n: u128, name: &str, value: Option<i64>, created_at: &str) -> Item {
        Item {
            id: Uuid::from_u128(n),
            name: name.to_owned(),
            value,
            created_at: created_at.to_owned(),
        }
    }

    fn dataset() -> Vec<Item> {
        vec![
            item(1, "Alpha", Some(10), "2026-01-10T08:00:00Z"),
            item(2, "beta", Some(30), "2026-01-15T10:00:00Z"),
            item(3, "Gamma", None, "2026-01-20T12:00:00Z"),
            item(4, "delta", Some(30), "2026-01-25T14:00:00Z"),
        ]
    }

    fn names(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    fn run(criteria: &Criteria) -> Vec<Item> {
        MemoryCriteriaConverter::default()
            .query(&dataset(), criteria)
            .unwrap()
            .items
    }

    #[rstest]
    #[case("=", "30", vec!["beta", "delta"])]
    #[case("!=", "30", vec!["Alpha", "Gamma"])]
    #[case(">", "10", vec!["beta", "delta"])]
    #[case("<", "30", vec!["Alpha"])]
    fn test_value_operators(#[case] op: &str, #[case] value: &str, #[case] expected: Vec<&str>) {
        // Arrange
        let criteria = Criteria::builder()
            .filter_parsed("value", op, value)
            .build()
            .unwrap();

        // Act
        let items = run(&criteria);

        // Assert
        assert_eq!(names(&items), expected);
    }

    #[rstest]
    #[case("CONTAINS", "ALP", vec!["Alpha"])]
    #[case("CONTAINS", "a", vec!["Alpha", "beta", "Gamma", "delta"])]
    #[case("NOT_CONTAINS", "ta", vec!["Alpha", "Gamma"])]
    fn test_substring_operators_ignore_case(
        #[case] op: &str,
        #[case] value: &str,
        #[case] expected: Vec<&str>,
    ) {
        let criteria = Criteria::builder()
            .filter_parsed("name", op, value)
            .build()
            .unwrap();

        assert_eq!(names(&run(&criteria)), expected);
    }

    #[test]
    fn test_date_field_accepts_bare_date() {
        let criteria = Criteria::builder()
            .filter_parsed("createdAt", ">", "2026-01-15")
            .build()
            .unwrap();

        assert_eq!(names(&run(&criteria)), vec!["beta", "Gamma", "delta"]);
    }

    #[test]
    fn test_numeric_date_field_is_read_as_epoch_millis() {
        let predicate =
            MemoryPredicate::new("createdAt", None, FilterOperator::Gt, "2026-01-01").unwrap();
        let millis = chrono::DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z")
            .unwrap()
            .timestamp_millis();

        assert!(predicate.matches(&json!({"createdAt": millis})));
    }

    #[test]
    fn test_sort_puts_nulls_first_ascending_and_last_descending() {
        let asc = Criteria::builder().order(Order::asc("value")).build().unwrap();
        let desc = Criteria::builder().order(Order::desc("value")).build().unwrap();

        assert_eq!(names(&run(&asc)), vec!["Gamma", "Alpha", "beta", "delta"]);
        assert_eq!(names(&run(&desc)), vec!["delta", "beta", "Alpha", "Gamma"]);
    }

    #[rstest]
    #[case(2, 0, vec!["Alpha", "beta"])]
    #[case(2, 3, vec!["delta"])]
    #[case(2, 4, vec![])]
    #[case(0, 0, vec![])]
    fn test_offset_window(#[case] limit: u64, #[case] offset: u64, #[case] expected: Vec<&str>) {
        let criteria = Criteria::builder()
            .order(Order::asc("createdAt"))
            .offset(limit, offset)
            .build()
            .unwrap();

        assert_eq!(names(&run(&criteria)), expected);
    }

    #[test]
    fn test_cursor_walk_visits_every_record_once() {
        // Arrange
        let records = dataset();
        let mut seen = Vec::new();
        let mut pagination = Pagination::first_page(3);

        // Act
        loop {
            let criteria = Criteria::builder()
                .order(Order::desc("createdAt"))
                .paginate(pagination)
                .build()
                .unwrap();
            let page = MemoryCriteriaConverter::default().query(&records, &criteria).unwrap();
            seen.extend(page.items.iter().map(|i| i.name.clone()));
            match page.next_cursor {
                Some(token) => pagination = Pagination::cursor_from_token(3, &token).unwrap(),
                None => break,
            }
        }

        // Assert
        assert_eq!(seen, vec!["delta", "Gamma", "beta", "Alpha"]);
    }

    #[test]
    fn test_cursor_tiebreaks_on_id() {
        let criteria = Criteria::builder()
            .order(Order::asc("value"))
            .paginate(Pagination::after(
                10,
                CursorPosition::new("30", Uuid::from_u128(2).to_string()),
            ))
            .build()
            .unwrap();

        assert_eq!(names(&run(&criteria)), vec!["delta"]);
    }

    #[test]
    fn test_count_ignores_pagination_and_total_is_reported() {
        let criteria = Criteria::builder()
            .filter_parsed("value", "=", "30")
            .order(Order::asc("name"))
            .offset(1, 0)
            .with_total()
            .build()
            .unwrap();

        let page = MemoryCriteriaConverter::default().query(&dataset(), &criteria).unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page.total, Some(2));
        assert!(page.has_next);
        assert_eq!(MemoryCriteriaConverter::default().count(&dataset(), &criteria).unwrap(), 2);
    }

    #[test]
    fn test_next_cursor_encodes_last_record() {
        let criteria = Criteria::builder()
            .order(Order::asc("createdAt"))
            .paginate(Pagination::first_page(1))
            .build()
            .unwrap();

        let page = MemoryCriteriaConverter::default().query(&dataset(), &criteria).unwrap();
        let token = CursorToken::decode(page.next_cursor.as_deref().unwrap()).unwrap();

        assert_eq!(token.after, "2026-01-10T08:00:00Z");
        assert_eq!(token.tiebreaker_id, Uuid::from_u128(1).to_string());
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        id: Uuid,
        label: String,
    }

    const TAG_FIELDS: &[QueryableField] = &[QueryableField::new("label", FieldKind::Text)];

    impl Aggregate for Tag {
        const COLLECTION: &'static str = "tags";

        fn id(&self) -> Uuid {
            self.id
        }

        fn queryable_fields() -> &'static [QueryableField] {
            TAG_FIELDS
        }
    }

    fn tags() -> Vec<Tag> {
        ["bob", "007", "alice", "7"]
            .iter()
            .enumerate()
            .map(|(n, label)| Tag {
                id: Uuid::from_u128(n as u128 + 1),
                label: (*label).to_owned(),
            })
            .collect()
    }

    fn walk<A: Aggregate>(
        converter: MemoryCriteriaConverter,
        records: &[A],
        order: Order,
        limit: u64,
    ) -> Vec<A> {
        let mut seen = Vec::new();
        let mut pagination = Pagination::first_page(limit);
        loop {
            let criteria = Criteria::builder()
                .order(order.clone())
                .paginate(pagination)
                .build()
                .unwrap();
            let page = converter.query(records, &criteria).unwrap();
            seen.extend(page.items);
            match page.next_cursor {
                Some(token) => pagination = Pagination::cursor_from_token(limit, &token).unwrap(),
                None => break,
            }
        }
        seen
    }

    #[test]
    fn test_declared_text_field_compares_as_text() {
        // Arrange
        let converter = MemoryCriteriaConverter::for_aggregate::<Tag>();
        let criteria = Criteria::builder()
            .filter_parsed("label", "=", "007")
            .build()
            .unwrap();

        // Act
        let page = converter.query(&tags(), &criteria).unwrap();

        // Assert
        let labels: Vec<&str> = page.items.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["007"]);
    }

    #[rstest]
    #[case(Order::asc("label"))]
    #[case(Order::desc("label"))]
    fn test_cursor_walk_over_declared_text_matches_single_page(#[case] order: Order) {
        // Arrange
        let converter = MemoryCriteriaConverter::for_aggregate::<Tag>();
        let everything = Criteria::builder().order(order.clone()).build().unwrap();
        let expected = converter.query(&tags(), &everything).unwrap().items;

        // Act
        let walked = walk(converter, &tags(), order, 1);

        // Assert
        assert_eq!(walked, expected);
    }

    #[rstest]
    #[case(Order::asc("code"))]
    #[case(Order::desc("code"))]
    fn test_cursor_walk_over_mixed_types_visits_every_record(#[case] order: Order) {
        // Arrange
        let records: Vec<Loose> = vec![
            loose(1, json!(7)),
            loose(2, json!("alice")),
            loose(3, json!(true)),
            loose(4, json!("2026-01-01T00:00:00Z")),
            loose(5, json!(2)),
        ];
        let converter = MemoryCriteriaConverter::default();
        let everything = Criteria::builder().order(order.clone()).build().unwrap();
        let expected = converter.query(&records, &everything).unwrap().items;

        // Act
        let walked = walk(converter, &records, order, 2);

        // Assert
        assert_eq!(walked.len(), records.len());
        assert_eq!(walked, expected);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Loose {
        id: Uuid,
        code: Value,
    }

    impl Aggregate for Loose {
        const COLLECTION: &'static str = "loose";

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn loose(n: u128, code: Value) -> Loose {
        Loose {
            id: Uuid::from_u128(n),
            code,
        }
    }

    #[test]
    fn test_undeclared_field_is_rejected_when_aggregate_declares_fields() {
        let criteria = Criteria::builder()
            .filter_parsed("secret", "=", "x")
            .build()
            .unwrap();

        let result = MemoryCriteriaConverter::for_aggregate::<Tag>().query(&tags(), &criteria);

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }
}
