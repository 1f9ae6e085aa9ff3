//! Filters: a field path, an operator and a string-encoded value.

use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Path of the field a filter or order addresses. Dotted for nested fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterField(String);

impl FilterField {
    /// Creates a field path, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the path is blank.
    pub fn new(name: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid("filter field must not be empty"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The field path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Comparison applied by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// Case-insensitive substring match.
    Contains,
    /// Negated case-insensitive substring match.
    NotContains,
    /// `>`
    Gt,
    /// `<`
    Lt,
}

impl FilterOperator {
    /// Returns `true` for the substring operators.
    #[must_use]
    pub fn is_string_operator(self) -> bool {
        matches!(self, Self::Contains | Self::NotContains)
    }

    /// The canonical wire token.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT_CONTAINS",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = DomainError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_uppercase().as_str() {
            "=" | "EQUAL" => Ok(Self::Equal),
            "!=" | "NOT_EQUAL" => Ok(Self::NotEqual),
            "CONTAINS" => Ok(Self::Contains),
            "NOT_CONTAINS" => Ok(Self::NotContains),
            ">" | "GT" => Ok(Self::Gt),
            "<" | "LT" => Ok(Self::Lt),
            other => Err(DomainError::invalid(format!(
                "unknown filter operator: {other}"
            ))),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// String-encoded filter value; its type is inferred per backend with
/// [`parse_from_string`](super::value::parse_from_string).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterValue(String);

impl FilterValue {
    /// Wraps a raw value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single `(field, operator, value)` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Addressed field.
    pub field: FilterField,
    /// Comparison.
    pub operator: FilterOperator,
    /// Compared value.
    pub value: FilterValue,
}

impl Filter {
    /// Creates a filter.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the field is blank.
    pub fn new(
        field: impl AsRef<str>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            field: FilterField::new(field)?,
            operator,
            value: FilterValue::new(value),
        })
    }

    /// Creates a filter from a textual operator token.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the field is blank or the
    /// operator token is unknown.
    pub fn parse(
        field: impl AsRef<str>,
        operator: &str,
        value: impl Into<String>,
    ) -> Result<Self, DomainError> {
        Self::new(field, operator.parse()?, value)
    }
}

/// Ordered list of filters, AND-combined. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(Vec<Filter>);

impl Filters {
    /// An empty filter list.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` when there are no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the filters in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.0.iter()
    }

    pub(crate) fn push(&mut self, filter: Filter) {
        self.0.push(filter);
    }
}

impl From<Vec<Filter>> for Filters {
    fn from(filters: Vec<Filter>) -> Self {
        Self(filters)
    }
}

impl<'a> IntoIterator for &'a Filters {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("=", FilterOperator::Equal)]
    #[case("!=", FilterOperator::NotEqual)]
    #[case("CONTAINS", FilterOperator::Contains)]
    #[case("not_contains", FilterOperator::NotContains)]
    #[case(">", FilterOperator::Gt)]
    #[case("<", FilterOperator::Lt)]
    #[case("equal", FilterOperator::Equal)]
    #[case("GT", FilterOperator::Gt)]
    fn test_operator_parses_tokens(#[case] token: &str, #[case] expected: FilterOperator) {
        assert_eq!(token.parse::<FilterOperator>().unwrap(), expected);
    }

    #[rstest]
    #[case(">=")]
    #[case("LIKE")]
    #[case("")]
    fn test_operator_rejects_unknown_tokens(#[case] token: &str) {
        let result = token.parse::<FilterOperator>();

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn test_field_rejects_blank_path() {
        assert!(FilterField::new("   ").is_err());
        assert_eq!(FilterField::new(" status ").unwrap().as_str(), "status");
    }

    #[test]
    fn test_filter_parse_builds_filter() {
        // Arrange & Act
        let filter = Filter::parse("value", ">", "10").unwrap();

        // Assert
        assert_eq!(filter.field.as_str(), "value");
        assert_eq!(filter.operator, FilterOperator::Gt);
        assert_eq!(filter.value.as_str(), "10");
    }

    #[test]
    fn test_only_substring_operators_are_string_operators() {
        assert!(FilterOperator::Contains.is_string_operator());
        assert!(FilterOperator::NotContains.is_string_operator());
        assert!(!FilterOperator::Equal.is_string_operator());
    }
}
