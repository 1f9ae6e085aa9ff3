//! Criteria to SQL over JSONB document columns.
//!
//! Fields are looked up in the aggregate's declared
//! [`QueryableField`] schema, which decides the cast applied to the JSON
//! text. Identifiers therefore never come from criteria input, and every
//! value is sent as a bound parameter.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tessera_core::aggregate::{Aggregate, FieldKind, QueryableField};
use tessera_core::criteria::value::{ScalarValue, parse_as};
use tessera_core::criteria::{
    Criteria, CriteriaConverter, CriteriaPage, CursorPosition, Filter, FilterOperator, Pagination,
};
use tessera_core::error::DomainError;
use uuid::Uuid;

use crate::schema::quote_ident;

/// A value bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// `text`.
    Text(String),
    /// `double precision`.
    Number(f64),
    /// `boolean`.
    Boolean(bool),
    /// `timestamptz`.
    Timestamp(DateTime<Utc>),
    /// `uuid`.
    Uuid(Uuid),
}

impl SqlValue {
    fn from_scalar(value: ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::Text(v) => Some(Self::Text(v)),
            ScalarValue::Number(v) => Some(Self::Number(v)),
            ScalarValue::Bool(v) => Some(Self::Boolean(v)),
            ScalarValue::Date(v) => Some(Self::Timestamp(v)),
            ScalarValue::Null => None,
        }
    }

    fn parse(raw: &str, kind: FieldKind, field: &str) -> Result<Self, DomainError> {
        let parsed = match kind {
            FieldKind::Uuid => Uuid::parse_str(raw.trim()).ok().map(Self::Uuid),
            kind => parse_as(kind, raw).and_then(Self::from_scalar),
        };
        parsed.ok_or_else(|| {
            DomainError::invalid(format!("value '{raw}' is not a valid {kind:?} for field '{field}'"))
        })
    }

    /// Binds the value. Timestamps are bound as text and cast in SQL, so
    /// they round to microseconds exactly like the stored text they are
    /// compared with.
    fn push_bind(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Text(v) => {
                builder.push_bind(v.clone());
            }
            Self::Number(v) => {
                builder.push_bind(*v);
            }
            Self::Boolean(v) => {
                builder.push_bind(*v);
            }
            Self::Timestamp(v) => {
                builder.push_bind(v.to_rfc3339_opts(SecondsFormat::AutoSi, true));
                builder.push("::timestamptz");
            }
            Self::Uuid(v) => {
                builder.push_bind(*v);
            }
        }
    }
}

/// A resolved, declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlField {
    /// The primary key column.
    Id,
    /// A path into the `document` column.
    Document {
        /// Path segments.
        path: Vec<String>,
        /// Declared type.
        kind: FieldKind,
    },
}

impl SqlField {
    fn kind(&self) -> FieldKind {
        match self {
            Self::Id => FieldKind::Uuid,
            Self::Document { kind, .. } => *kind,
        }
    }

    /// The field as text, as stored.
    fn raw(&self) -> String {
        match self {
            Self::Id => "id::text".to_owned(),
            Self::Document { path, .. } if path.len() == 1 => {
                format!("(document->>'{}')", path[0])
            }
            Self::Document { path, .. } => format!("(document #>> '{{{}}}')", path.join(",")),
        }
    }

    /// The field cast to its declared type.
    fn typed(&self) -> String {
        let raw = self.raw();
        match self {
            Self::Id => "id".to_owned(),
            Self::Document { kind, .. } => match kind {
                FieldKind::Text => format!("({raw} COLLATE \"C\")"),
                FieldKind::Number => format!("{raw}::double precision"),
                FieldKind::Boolean => format!("{raw}::boolean"),
                FieldKind::Timestamp => format!("{raw}::timestamptz"),
                FieldKind::Uuid => format!("{raw}::uuid"),
            },
        }
    }
}

/// Comparison rendered with a plain SQL operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlComparison {
    /// `=`
    Equal,
    /// `>`
    Greater,
    /// `<`
    Less,
}

impl SqlComparison {
    fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::Greater => ">",
            Self::Less => "<",
        }
    }
}

/// One AND-combined condition of the WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlPredicate {
    /// `typed <op> $n`; false for null.
    Compare {
        /// Field.
        field: SqlField,
        /// Operator.
        comparison: SqlComparison,
        /// Bound value.
        value: SqlValue,
    },
    /// `typed IS DISTINCT FROM $n`; true for null.
    DistinctFrom {
        /// Field.
        field: SqlField,
        /// Bound value.
        value: SqlValue,
    },
    /// Case-insensitive substring test on the stored text.
    Contains {
        /// Field.
        field: SqlField,
        /// Substring.
        needle: String,
        /// NOT_CONTAINS; also true for null.
        negated: bool,
    },
    /// Rows strictly past a cursor position; null order values never match.
    Keyset {
        /// Order field.
        field: SqlField,
        /// Order value of the last row seen.
        after: SqlValue,
        /// Id of the last row seen.
        tiebreaker: Uuid,
        /// Descending walk.
        descending: bool,
    },
}

impl SqlPredicate {
    fn push(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Compare {
                field,
                comparison,
                value,
            } => {
                builder.push(format!("{} {} ", field.typed(), comparison.symbol()));
                value.push_bind(builder);
            }
            Self::DistinctFrom { field, value } => {
                builder.push(format!("{} IS DISTINCT FROM ", field.typed()));
                value.push_bind(builder);
            }
            Self::Contains {
                field,
                needle,
                negated,
            } => {
                let position = format!("strpos(lower({}), lower(", field.raw());
                if *negated {
                    builder.push(format!("COALESCE({position}"));
                    builder.push_bind(needle.clone());
                    builder.push(")), 0) = 0");
                } else {
                    builder.push(position);
                    builder.push_bind(needle.clone());
                    builder.push(")) > 0");
                }
            }
            Self::Keyset {
                field,
                after,
                tiebreaker,
                descending,
            } => {
                let past = if *descending { "<" } else { ">" };
                let typed = field.typed();
                builder.push(format!("({typed} {past} "));
                after.push_bind(builder);
                builder.push(format!(" OR ({typed} = "));
                after.push_bind(builder);
                builder.push(format!(" AND id {past} "));
                builder.push_bind(*tiebreaker);
                builder.push("))");
            }
        }
    }
}

/// ORDER BY on one field with the id tiebreaker in the same direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlOrder {
    /// Order field.
    pub field: SqlField,
    /// Descending order.
    pub descending: bool,
}

/// LIMIT / OFFSET, the limit including one row of look-ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlWindow {
    /// Rows to fetch.
    pub limit: i64,
    /// Rows to skip.
    pub offset: i64,
}

/// A compiled query against one aggregate table.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    /// Quoted table name.
    pub table: String,
    /// AND-combined conditions.
    pub predicates: Vec<SqlPredicate>,
    /// Sort, when the criteria carry an order.
    pub order: Option<SqlOrder>,
    /// Window, when the criteria paginate.
    pub window: Option<SqlWindow>,
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl SqlQuery {
    /// Appends ` WHERE ...` when there are predicates.
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        for (i, predicate) in self.predicates.iter().enumerate() {
            builder.push(if i == 0 { " WHERE " } else { " AND " });
            predicate.push(builder);
        }
    }

    /// Appends ` ORDER BY ...` when there is an order.
    pub fn push_order(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if let Some(order) = &self.order {
            let (direction, nulls) = if order.descending {
                ("DESC", "NULLS LAST")
            } else {
                ("ASC", "NULLS FIRST")
            };
            builder.push(format!(
                " ORDER BY {} {direction} {nulls}, id {direction}",
                order.field.typed()
            ));
        }
    }

    /// Appends ` LIMIT $n OFFSET $m` when paginating.
    pub fn push_window(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if let Some(window) = self.window {
            builder.push(" LIMIT ");
            builder.push_bind(window.limit);
            builder.push(" OFFSET ");
            builder.push_bind(window.offset);
        }
    }

    /// `SELECT document` with filters, order and window.
    #[must_use]
    pub fn select(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!("SELECT document FROM {}", self.table));
        self.push_where(&mut builder);
        self.push_order(&mut builder);
        self.push_window(&mut builder);
        builder
    }

    /// `SELECT COUNT(*)` with filters only.
    #[must_use]
    pub fn count(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", self.table));
        self.push_where(&mut builder);
        builder
    }
}

/// Converts criteria into [`SqlQuery`]s for one aggregate table.
#[derive(Debug, Clone, Copy)]
pub struct SqlCriteriaConverter {
    collection: &'static str,
    fields: &'static [QueryableField],
}

impl SqlCriteriaConverter {
    /// Converter for the table and declared fields of `A`.
    #[must_use]
    pub fn for_aggregate<A: Aggregate>() -> Self {
        Self {
            collection: A::COLLECTION,
            fields: A::queryable_fields(),
        }
    }

    fn field(&self, name: &str) -> Result<SqlField, DomainError> {
        if name == "id" {
            return Ok(SqlField::Id);
        }
        let declared = self
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                DomainError::invalid(format!(
                    "field '{name}' is not queryable on {}",
                    self.collection
                ))
            })?;
        let path: Vec<String> = declared.name.split('.').map(str::to_owned).collect();
        let valid = path.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
        if !valid {
            return Err(DomainError::invalid(format!(
                "field '{name}' has an unsupported path"
            )));
        }
        Ok(SqlField::Document {
            path,
            kind: declared.kind,
        })
    }

    fn predicate(&self, filter: &Filter) -> Result<SqlPredicate, DomainError> {
        let name = filter.field.as_str();
        let field = self.field(name)?;
        let raw = filter.value.as_str();
        let compare = |comparison| -> Result<SqlPredicate, DomainError> {
            Ok(SqlPredicate::Compare {
                value: SqlValue::parse(raw, field.kind(), name)?,
                field: field.clone(),
                comparison,
            })
        };
        match filter.operator {
            FilterOperator::Equal => compare(SqlComparison::Equal),
            FilterOperator::Gt => compare(SqlComparison::Greater),
            FilterOperator::Lt => compare(SqlComparison::Less),
            FilterOperator::NotEqual => Ok(SqlPredicate::DistinctFrom {
                value: SqlValue::parse(raw, field.kind(), name)?,
                field,
            }),
            FilterOperator::Contains | FilterOperator::NotContains => Ok(SqlPredicate::Contains {
                field,
                needle: raw.to_owned(),
                negated: filter.operator == FilterOperator::NotContains,
            }),
        }
    }

    fn keyset(
        &self,
        field: SqlField,
        position: &CursorPosition,
        descending: bool,
    ) -> Result<SqlPredicate, DomainError> {
        let after = SqlValue::parse(&position.after, field.kind(), "cursor")?;
        let tiebreaker = Uuid::parse_str(&position.tiebreaker_id)
            .map_err(|_| DomainError::invalid("malformed cursor token"))?;
        Ok(SqlPredicate::Keyset {
            field,
            after,
            tiebreaker,
            descending,
        })
    }
}

/// Decodes the `document` column of a row.
pub(crate) fn decode_row<A: Aggregate>(row: &PgRow, operation: &str) -> Result<A, DomainError> {
    row.try_get::<Json<A>, _>("document")
        .map(|Json(aggregate)| aggregate)
        .map_err(|e| DomainError::infrastructure(operation, A::COLLECTION, e))
}

impl SqlCriteriaConverter {
    /// Runs the criteria against the aggregate table and builds the page.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for criteria the table cannot
    /// answer, or `DomainError::Infrastructure` if the query fails or a
    /// document does not deserialize.
    pub async fn query<A: Aggregate>(
        &self,
        pool: &PgPool,
        criteria: &Criteria,
    ) -> Result<CriteriaPage<A>, DomainError> {
        let query = self.convert(criteria)?;
        let mut select = query.select();
        let rows = select
            .build()
            .fetch_all(pool)
            .await
            .map_err(|e| DomainError::infrastructure("find_by_criteria", A::COLLECTION, e))?;
        let items = rows
            .iter()
            .map(|row| decode_row(row, "find_by_criteria"))
            .collect::<Result<Vec<A>, _>>()?;
        let total = if criteria.with_total() {
            Some(self.count::<A>(pool, criteria).await?)
        } else {
            None
        };
        Ok(CriteriaPage::from_window(items, criteria, total))
    }

    /// Counts rows matching the criteria, ignoring pagination.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for criteria the table cannot
    /// answer, or `DomainError::Infrastructure` if the query fails.
    pub async fn count<A: Aggregate>(
        &self,
        pool: &PgPool,
        criteria: &Criteria,
    ) -> Result<u64, DomainError> {
        let query = self.convert(&criteria.without_pagination())?;
        let mut count = query.count();
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await
            .map_err(|e| DomainError::infrastructure("count_by_criteria", A::COLLECTION, e))?;
        Ok(u64::try_from(total).unwrap_or_default())
    }
}

impl CriteriaConverter for SqlCriteriaConverter {
    type Query = SqlQuery;

    fn convert(&self, criteria: &Criteria) -> Result<SqlQuery, DomainError> {
        let mut predicates = criteria
            .filters()
            .iter()
            .map(|filter| self.predicate(filter))
            .collect::<Result<Vec<_>, _>>()?;

        let order = criteria.order();
        let sort = if order.has_order() {
            Some(SqlOrder {
                field: self.field(&order.order_by)?,
                descending: order.order_type.is_desc(),
            })
        } else {
            None
        };

        let window = match criteria.pagination() {
            None => None,
            Some(Pagination::Offset { limit, offset }) => Some(SqlWindow {
                limit: to_i64(limit.saturating_add(1)),
                offset: to_i64(*offset),
            }),
            Some(Pagination::Cursor { limit, after }) => {
                if let (Some(position), Some(sort)) = (after, &sort) {
                    predicates.push(self.keyset(sort.field.clone(), position, sort.descending)?);
                }
                Some(SqlWindow {
                    limit: to_i64(limit.saturating_add(1)),
                    offset: 0,
                })
            }
        };

        Ok(SqlQuery {
            table: quote_ident(self.collection),
            predicates,
            order: sort,
            window,
        })
    }
}
