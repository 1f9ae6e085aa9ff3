//! Criteria to Mongo-style filter documents and find options.

use serde_json::{Value, json};
use tessera_core::aggregate::{Aggregate, FieldKind, FieldSchema};
use tessera_core::criteria::value::{ScalarValue, typed_filter_value};
use tessera_core::criteria::{
    Criteria, CriteriaConverter, CriteriaPage, CursorPosition, Filter, FilterOperator, Pagination,
};
use tessera_core::error::DomainError;

use crate::store::{DocumentStore, FindOptions, SortDirection};

/// A filter document plus find options.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    /// `{}` or `{"$and": [...]}`.
    pub filter: Value,
    /// Sort, skip and limit (limit includes one row of look-ahead).
    pub options: FindOptions,
}

/// Converts criteria into [`DocumentQuery`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCriteriaConverter {
    schema: FieldSchema,
}

fn literal(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::Number(n) => json!(n),
        ScalarValue::Bool(b) => json!(b),
        ScalarValue::Date(d) => json!({ "$date": d.to_rfc3339() }),
        ScalarValue::Text(s) => json!(s),
        ScalarValue::Null => Value::Null,
    }
}

fn contains_pattern(raw: &str) -> Value {
    json!({ "$regex": regex::escape(raw), "$options": "i" })
}

fn filter_clause(filter: &Filter, kind: Option<FieldKind>) -> Result<Value, DomainError> {
    let field = filter.field.as_str();
    let raw = filter.value.as_str();
    let typed = || typed_filter_value(kind, field, raw).map(|v| literal(&v));
    let condition = match filter.operator {
        FilterOperator::Equal => typed()?,
        FilterOperator::NotEqual => json!({ "$ne": typed()? }),
        FilterOperator::Gt => json!({ "$gt": typed()? }),
        FilterOperator::Lt => json!({ "$lt": typed()? }),
        FilterOperator::Contains => contains_pattern(raw),
        FilterOperator::NotContains => json!({ "$not": contains_pattern(raw) }),
    };
    Ok(json!({ field: condition }))
}

/// Records strictly past `position` in sort order. Declared fields hold one
/// type, so a comparison suffices; undeclared fields may mix types, so the
/// types sorting beyond the resume value are matched by `$type`.
fn keyset_clause(
    field: &str,
    kind: Option<FieldKind>,
    position: &CursorPosition,
    descending: bool,
) -> Result<Value, DomainError> {
    let past = if descending { "$lt" } else { "$gt" };
    let after = typed_filter_value(kind, field, &position.after)?;
    let value = literal(&after);
    let mut branches = vec![
        json!({ field: { past: value.clone() } }),
        json!({ field: value, "id": { past: position.tiebreaker_id } }),
    ];
    let beyond = after.types_beyond(descending);
    if kind.is_none() && !beyond.is_empty() {
        branches.push(json!({ field: { "$type": beyond } }));
    }
    Ok(json!({ "$or": branches }))
}

impl CriteriaConverter for DocumentCriteriaConverter {
    type Query = DocumentQuery;

    fn convert(&self, criteria: &Criteria) -> Result<DocumentQuery, DomainError> {
        let order = criteria.order();
        let mut clauses = criteria
            .filters()
            .iter()
            .map(|f| filter_clause(f, self.schema.kind_of(f.field.as_str())?))
            .collect::<Result<Vec<_>, _>>()?;

        let mut options = FindOptions::default();
        if order.has_order() {
            self.schema.kind_of(&order.order_by)?;
            let direction = if order.order_type.is_desc() {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            options.sort = vec![
                (order.order_by.clone(), direction),
                ("id".to_owned(), direction),
            ];
        }

        match criteria.pagination() {
            None => {}
            Some(Pagination::Offset { limit, offset }) => {
                options.skip = Some(*offset);
                options.limit = Some(limit.saturating_add(1));
            }
            Some(Pagination::Cursor { limit, after }) => {
                if let Some(position) = after {
                    clauses.push(keyset_clause(
                        &order.order_by,
                        self.schema.kind_of(&order.order_by)?,
                        position,
                        order.order_type.is_desc(),
                    )?);
                }
                options.limit = Some(limit.saturating_add(1));
            }
        }

        let filter = if clauses.is_empty() {
            json!({})
        } else {
            json!({ "$and": clauses })
        };
        Ok(DocumentQuery { filter, options })
    }
}

fn driver_error(operation: &str, collection: &str, cause: crate::store::DocumentError) -> DomainError {
    DomainError::infrastructure(operation, collection, cause)
}

impl DocumentCriteriaConverter {
    /// Converter typing values by the fields `A` declares.
    #[must_use]
    pub fn for_aggregate<A: Aggregate>() -> Self {
        Self {
            schema: FieldSchema::of::<A>(),
        }
    }

    /// Runs the criteria against a collection and builds the page.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if a field is not queryable or
    /// a value does not fit its declared kind, and
    /// `DomainError::Infrastructure` if the store fails or a document does
    /// not deserialize.
    pub fn query<A: Aggregate>(
        &self,
        store: &DocumentStore,
        criteria: &Criteria,
    ) -> Result<CriteriaPage<A>, DomainError> {
        let query = self.convert(criteria)?;
        let documents = store
            .find(A::COLLECTION, &query.filter, &query.options)
            .map_err(|e| driver_error("find_by_criteria", A::COLLECTION, e))?;
        let items = documents
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<A>, _>>()
            .map_err(|e| DomainError::infrastructure("find_by_criteria", A::COLLECTION, e))?;
        let total = if criteria.with_total() {
            Some(self.count::<A>(store, criteria)?)
        } else {
            None
        };
        Ok(CriteriaPage::from_window(items, criteria, total))
    }

    /// Counts documents matching the criteria, ignoring pagination.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store fails.
    pub fn count<A: Aggregate>(
        &self,
        store: &DocumentStore,
        criteria: &Criteria,
    ) -> Result<u64, DomainError> {
        let query = self.convert(&criteria.without_pagination())?;
        store
            .count(A::COLLECTION, &query.filter)
            .map_err(|e| driver_error("count_by_criteria", A::COLLECTION, e))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde::{Deserialize, Serialize};
    use tessera_core::aggregate::QueryableField;
    use tessera_core::criteria::Order;

    use super::*;

    fn convert(criteria: &Criteria) -> DocumentQuery {
        DocumentCriteriaConverter::default().convert(criteria).unwrap()
    }

    #[test]
    fn test_no_filters_yield_empty_filter_and_no_sort() {
        let query = convert(&Criteria::all());

        assert_eq!(query.filter, json!({}));
        assert_eq!(query.options, FindOptions::default());
    }

    #[rstest]
    #[case("=", "active", json!({"status": "active"}))]
    #[case("!=", "30", json!({"status": {"$ne": 30.0}}))]
    #[case(">", "true", json!({"status": {"$gt": true}}))]
    #[case("<", "2026-01-15T10:00:00Z", json!({"status": {"$lt": {"$date": "2026-01-15T10:00:00+00:00"}}}))]
    #[case("CONTAINS", "a.b", json!({"status": {"$regex": "a\\.b", "$options": "i"}}))]
    #[case("NOT_CONTAINS", "x", json!({"status": {"$not": {"$regex": "x", "$options": "i"}}}))]
    fn test_filter_clauses(#[case] op: &str, #[case] value: &str, #[case] expected: Value) {
        let criteria = Criteria::builder()
            .filter_parsed("status", op, value)
            .build()
            .unwrap();

        assert_eq!(convert(&criteria).filter, json!({ "$and": [expected] }));
    }

    #[test]
    fn test_order_adds_id_tiebreaker_in_same_direction() {
        let criteria = Criteria::builder()
            .order(Order::desc("createdAt"))
            .offset(10, 20)
            .build()
            .unwrap();

        let query = convert(&criteria);

        assert_eq!(
            query.options.sort,
            vec![
                ("createdAt".to_owned(), SortDirection::Descending),
                ("id".to_owned(), SortDirection::Descending),
            ]
        );
        assert_eq!(query.options.skip, Some(20));
        assert_eq!(query.options.limit, Some(11));
    }

    #[test]
    fn test_cursor_after_adds_keyset_clause() {
        let criteria = Criteria::builder()
            .order(Order::asc("value"))
            .paginate(Pagination::after(5, CursorPosition::new("30", "id-3")))
            .build()
            .unwrap();

        let query = convert(&criteria);

        assert_eq!(
            query.filter,
            json!({"$and": [{"$or": [
                {"value": {"$gt": 30.0}},
                {"value": 30.0, "id": {"$gt": "id-3"}},
                {"value": {"$type": ["string", "bool", "date"]}},
            ]}]})
        );
        assert_eq!(query.options.skip, None);
        assert_eq!(query.options.limit, Some(6));
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Account {
        id: uuid::Uuid,
        username: String,
        age: i64,
        joined_at: String,
    }

    const ACCOUNT_FIELDS: &[QueryableField] = &[
        QueryableField::new("username", FieldKind::Text),
        QueryableField::new("age", FieldKind::Number),
        QueryableField::new("joinedAt", FieldKind::Timestamp),
    ];

    impl Aggregate for Account {
        const COLLECTION: &'static str = "accounts";

        fn id(&self) -> uuid::Uuid {
            self.id
        }

        fn queryable_fields() -> &'static [QueryableField] {
            ACCOUNT_FIELDS
        }
    }

    fn convert_declared(criteria: &Criteria) -> Result<DocumentQuery, DomainError> {
        DocumentCriteriaConverter::for_aggregate::<Account>().convert(criteria)
    }

    #[rstest]
    #[case("username", "=", "007", json!({"username": "007"}))]
    #[case("username", "=", "true", json!({"username": "true"}))]
    #[case("age", ">", "007", json!({"age": {"$gt": 7.0}}))]
    #[case("joinedAt", "<", "2026-01-03", json!({"joinedAt": {"$lt": {"$date": "2026-01-03T00:00:00+00:00"}}}))]
    fn test_declared_kinds_pick_literal_type(
        #[case] field: &str,
        #[case] op: &str,
        #[case] value: &str,
        #[case] expected: Value,
    ) {
        let criteria = Criteria::builder()
            .filter_parsed(field, op, value)
            .build()
            .unwrap();

        assert_eq!(convert_declared(&criteria).unwrap().filter, json!({ "$and": [expected] }));
    }

    #[rstest]
    #[case("secret", "=", "x")]
    #[case("age", "=", "old")]
    fn test_declared_schema_rejects_unknown_fields_and_mistyped_values(
        #[case] field: &str,
        #[case] op: &str,
        #[case] value: &str,
    ) {
        let criteria = Criteria::builder()
            .filter_parsed(field, op, value)
            .build()
            .unwrap();

        assert!(matches!(
            convert_declared(&criteria),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_declared_keyset_compares_within_the_kind() {
        let criteria = Criteria::builder()
            .order(Order::desc("username"))
            .paginate(Pagination::after(5, CursorPosition::new("007", "id-3")))
            .build()
            .unwrap();

        let query = convert_declared(&criteria).unwrap();

        assert_eq!(
            query.filter,
            json!({"$and": [{"$or": [
                {"username": {"$lt": "007"}},
                {"username": "007", "id": {"$lt": "id-3"}},
            ]}]})
        );
    }
}
