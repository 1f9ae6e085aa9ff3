//! Type inference and comparison for string-encoded filter values.
//!
//! Filter values travel as strings. When the aggregate declares the field,
//! its [`FieldKind`] decides how both the filter value and the stored value
//! are read ([`typed_filter_value`], [`typed_stored_value`]). Otherwise the
//! type is inferred the same way in every backend: finite numbers, then
//! `true`/`false`, then ISO-8601 date-times, and everything else stays text.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::aggregate::FieldKind;
use crate::error::DomainError;

/// A scalar after type inference.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// JSON null or a missing field.
    Null,
    /// Boolean.
    Bool(bool),
    /// Finite number.
    Number(f64),
    /// Text that is not a number, boolean or date-time.
    Text(String),
    /// UTC date-time.
    Date(DateTime<Utc>),
}

/// Type names in the order [`compare_values`] sorts them.
pub static TYPE_ORDER: [&str; 5] = ["null", "number", "string", "bool", "date"];

impl ScalarValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
            Self::Bool(_) => 3,
            Self::Date(_) => 4,
        }
    }

    /// Maps a JSON value. Strings go through [`parse_from_string`]; arrays
    /// and objects are compared by their JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => parse_from_string(s),
            other => Self::Text(other.to_string()),
        }
    }

    /// Name of the value's type in [`TYPE_ORDER`].
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        TYPE_ORDER[usize::from(self.rank())]
    }

    /// Type names sorting strictly before (`before == true`) or after this
    /// value's type, never including `null`.
    #[must_use]
    pub fn types_beyond(&self, before: bool) -> &'static [&'static str] {
        let rank = usize::from(self.rank());
        if before {
            &TYPE_ORDER[1.min(rank)..rank]
        } else {
            &TYPE_ORDER[(rank + 1).max(1)..]
        }
    }

    /// Returns `true` for `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Infers the type of a string-encoded scalar.
#[must_use]
pub fn parse_from_string(raw: &str) -> ScalarValue {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        if let Ok(number) = trimmed.parse::<f64>() {
            if number.is_finite() {
                return ScalarValue::Number(number);
            }
        }
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return ScalarValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return ScalarValue::Bool(false);
    }
    if let Some(date) = parse_datetime(trimmed) {
        return ScalarValue::Date(date);
    }
    ScalarValue::Text(raw.to_owned())
}

fn looks_like_datetime(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() < 19 {
        return false;
    }
    let digits = [0, 1, 2, 3, 5, 6, 8, 9, 11, 12, 14, 15, 17, 18];
    digits.iter().all(|&i| b[i].is_ascii_digit())
        && b[4] == b'-'
        && b[7] == b'-'
        && (b[10] == b'T' || b[10] == b' ')
        && b[13] == b':'
        && b[16] == b':'
}

/// Parses an ISO-8601 date-time (`T` or space separator, optional fraction,
/// optional offset; naive values are taken as UTC).
#[must_use]
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if !looks_like_datetime(s) {
        return None;
    }
    let normalized = if s.as_bytes()[10] == b' ' {
        format!("{}T{}", &s[..10], &s[11..])
    } else {
        s.to_owned()
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Like [`parse_datetime`] but also accepts a bare `YYYY-MM-DD` date
/// (midnight UTC). Used for fields known to hold dates.
#[must_use]
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    parse_datetime(raw).or_else(|| {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Returns `true` when the last segment of a field path names a date
/// (`createdAt`, `birthDate`, `startTime`, ...).
#[must_use]
pub fn is_date_field(field: &str) -> bool {
    let last = field.rsplit('.').next().unwrap_or(field);
    last.ends_with("At") || last.ends_with("Date") || last.ends_with("Time")
}

/// Total order used for sorting: nulls first, then numbers, text, booleans
/// and dates; same-typed values by natural order, text byte-wise.
#[must_use]
pub fn compare_values(a: &ScalarValue, b: &ScalarValue) -> Ordering {
    compare_same_type(a, b).unwrap_or_else(|| a.rank().cmp(&b.rank()))
}

/// Compares two values of the same type; `None` when the types differ.
/// Filters use this so that values of different types never match a
/// comparison.
#[must_use]
pub fn compare_same_type(a: &ScalarValue, b: &ScalarValue) -> Option<Ordering> {
    match (a, b) {
        (ScalarValue::Null, ScalarValue::Null) => Some(Ordering::Equal),
        (ScalarValue::Bool(x), ScalarValue::Bool(y)) => Some(x.cmp(y)),
        (ScalarValue::Number(x), ScalarValue::Number(y)) => Some(x.total_cmp(y)),
        (ScalarValue::Text(x), ScalarValue::Text(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        (ScalarValue::Date(x), ScalarValue::Date(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Reads a string-encoded value as `kind`; `None` when it does not parse.
/// UUIDs become their canonical lowercase text.
#[must_use]
pub fn parse_as(kind: FieldKind, raw: &str) -> Option<ScalarValue> {
    let trimmed = raw.trim();
    match kind {
        FieldKind::Text => Some(ScalarValue::Text(raw.to_owned())),
        FieldKind::Number => trimmed
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(ScalarValue::Number),
        FieldKind::Boolean => {
            if trimmed.eq_ignore_ascii_case("true") {
                Some(ScalarValue::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Some(ScalarValue::Bool(false))
            } else {
                None
            }
        }
        FieldKind::Timestamp => parse_date(trimmed).map(ScalarValue::Date),
        FieldKind::Uuid => Uuid::parse_str(trimmed)
            .ok()
            .map(|id| ScalarValue::Text(id.to_string())),
    }
}

/// Reads a stored JSON value as `kind`. Values that do not fit the kind read
/// as `Null`, so they never match a comparison. Text fields read any scalar
/// by its JSON text.
#[must_use]
pub fn from_json_as(kind: FieldKind, value: &Value) -> ScalarValue {
    match (kind, value) {
        (_, Value::Null) => ScalarValue::Null,
        (FieldKind::Text, other) => json_text(other).map_or(ScalarValue::Null, ScalarValue::Text),
        (FieldKind::Number, Value::Number(n)) => n.as_f64().map_or(ScalarValue::Null, ScalarValue::Number),
        (FieldKind::Boolean, Value::Bool(b)) => ScalarValue::Bool(*b),
        (FieldKind::Timestamp, Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map_or(ScalarValue::Null, ScalarValue::Date),
        (kind, Value::String(s)) => parse_as(kind, s).unwrap_or(ScalarValue::Null),
        _ => ScalarValue::Null,
    }
}

/// Types a filter or cursor value for `field`, using its declared kind when
/// there is one. Without a declaration, date-named fields accept a bare
/// `YYYY-MM-DD` and other values go through [`parse_from_string`].
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if the value does not parse as the
/// declared kind.
pub fn typed_filter_value(
    kind: Option<FieldKind>,
    field: &str,
    raw: &str,
) -> Result<ScalarValue, DomainError> {
    match kind {
        Some(kind) => parse_as(kind, raw).ok_or_else(|| {
            DomainError::invalid(format!(
                "value '{raw}' is not a valid {kind:?} for field '{field}'"
            ))
        }),
        None => Ok(infer_for_field(field, raw)),
    }
}

fn infer_for_field(field: &str, raw: &str) -> ScalarValue {
    if is_date_field(field) {
        if let Some(date) = parse_date(raw) {
            return ScalarValue::Date(date);
        }
    }
    parse_from_string(raw)
}

/// Types a stored value of `field`, using its declared kind when there is
/// one. Without a declaration, strings are dates when they hold an ISO-8601
/// date-time (or a bare date on date-named fields) and text otherwise, and
/// numbers on date-named fields are epoch milliseconds.
#[must_use]
pub fn typed_stored_value(kind: Option<FieldKind>, field: &str, value: &Value) -> ScalarValue {
    if let Some(kind) = kind {
        return from_json_as(kind, value);
    }
    if is_date_field(field) {
        let date = match value {
            Value::String(s) => parse_date(s),
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            _ => None,
        };
        if let Some(date) = date {
            return ScalarValue::Date(date);
        }
    }
    match value {
        Value::String(s) => parse_datetime(s).map_or_else(|| ScalarValue::Text(s.clone()), ScalarValue::Date),
        other => ScalarValue::from_json(other),
    }
}

/// Resolves a dotted field path inside a JSON document.
#[must_use]
pub fn lookup_path<'v>(document: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(document, |current, key| current.as_object()?.get(key))
}

/// Textual form of a JSON scalar as stored (strings verbatim). `None` for
/// null; arrays and objects render as JSON.
#[must_use]
pub fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
