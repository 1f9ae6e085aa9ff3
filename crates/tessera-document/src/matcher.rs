//! Evaluation of Mongo-style filter and sort documents.
//!
//! Supported filter syntax: implicit equality (`{f: v}`), `$eq`, `$ne`,
//! `$gt`, `$gte`, `$lt`, `$lte`, `$regex` with `$options`, `$not`,
//! `$exists`, `$type`, `$and`, `$or`. Date literals use extended JSON
//! (`{"$date": "<rfc3339>"}`) and compare against stored RFC 3339 strings.
//! Comparisons only match values of the same type. `$regex` reads numbers
//! and booleans by their JSON text. `$type` takes a name or a list of names
//! from [`TYPE_ORDER`], which is also the order sorting puts types in.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::{Map, Value};
use tessera_core::criteria::value::{
    ScalarValue, TYPE_ORDER, compare_same_type, compare_values, json_text, lookup_path,
    parse_datetime,
};

use crate::store::{DocumentError, SortDirection};

/// Returns `true` if `document` satisfies `filter`.
///
/// # Errors
///
/// Returns `DocumentError::InvalidFilter` for malformed or unsupported
/// filter syntax.
pub fn matches(document: &Value, filter: &Value) -> Result<bool, DocumentError> {
    match filter {
        Value::Object(conditions) => matches_all(document, conditions),
        other => Err(DocumentError::InvalidFilter(format!(
            "filter must be an object, got {other}"
        ))),
    }
}

fn matches_all(document: &Value, conditions: &Map<String, Value>) -> Result<bool, DocumentError> {
    for (key, condition) in conditions {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(condition)? {
                    if !matches(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(condition)? {
                    if matches(document, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            op if op.starts_with('$') => {
                return Err(DocumentError::InvalidFilter(format!(
                    "unsupported top-level operator {op}"
                )));
            }
            field => field_matches(lookup_path(document, field), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses(condition: &Value) -> Result<&Vec<Value>, DocumentError> {
    condition
        .as_array()
        .ok_or_else(|| DocumentError::InvalidFilter("$and/$or expects an array".to_owned()))
}

fn is_operator_object(condition: &Value) -> Option<&Map<String, Value>> {
    let map = condition.as_object()?;
    let operators = !map.is_empty()
        && map.keys().all(|k| k.starts_with('$'))
        && date_literal(condition).is_none();
    operators.then_some(map)
}

fn field_matches(stored: Option<&Value>, condition: &Value) -> Result<bool, DocumentError> {
    let Some(operators) = is_operator_object(condition) else {
        return Ok(equals(stored, condition));
    };
    for (op, argument) in operators {
        let matched = match op.as_str() {
            "$eq" => equals(stored, argument),
            "$ne" => !equals(stored, argument),
            "$gt" => compare(stored, argument) == Some(Ordering::Greater),
            "$gte" => matches!(
                compare(stored, argument),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            "$lt" => compare(stored, argument) == Some(Ordering::Less),
            "$lte" => matches!(
                compare(stored, argument),
                Some(Ordering::Less | Ordering::Equal)
            ),
            "$regex" => regex_matches(stored, argument, operators.get("$options"))?,
            "$options" => true,
            "$not" => !field_matches(stored, argument)?,
            "$exists" => {
                let wanted = argument.as_bool().ok_or_else(|| {
                    DocumentError::InvalidFilter("$exists expects a boolean".to_owned())
                })?;
                stored.is_some() == wanted
            }
            "$type" => type_matches(stored, argument)?,
            other => {
                return Err(DocumentError::InvalidFilter(format!(
                    "unsupported operator {other}"
                )));
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn regex_matches(
    stored: Option<&Value>,
    pattern: &Value,
    options: Option<&Value>,
) -> Result<bool, DocumentError> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| DocumentError::InvalidFilter("$regex expects a string".to_owned()))?;
    let options = options.and_then(Value::as_str).unwrap_or_default();
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .build()?;
    Ok(stored
        .filter(|v| !v.is_array() && !v.is_object())
        .and_then(json_text)
        .is_some_and(|text| regex.is_match(&text)))
}

fn type_matches(stored: Option<&Value>, names: &Value) -> Result<bool, DocumentError> {
    let names: Vec<&str> = match names {
        Value::String(name) => vec![name.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    if names.is_empty() || names.iter().any(|n| !TYPE_ORDER.contains(n)) {
        return Err(DocumentError::InvalidFilter(format!(
            "$type expects names from {TYPE_ORDER:?}"
        )));
    }
    Ok(stored.is_some_and(|v| names.contains(&stored_scalar(v).type_name())))
}

fn date_literal(value: &Value) -> Option<ScalarValue> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get("$date")
        .and_then(Value::as_str)
        .and_then(parse_datetime)
        .map(ScalarValue::Date)
}

/// Typed view of a stored value: RFC 3339 strings are dates, other strings
/// are text.
#[must_use]
pub fn stored_scalar(value: &Value) -> ScalarValue {
    match value {
        Value::Null => ScalarValue::Null,
        Value::Bool(b) => ScalarValue::Bool(*b),
        Value::Number(n) => n.as_f64().map_or(ScalarValue::Null, ScalarValue::Number),
        Value::String(s) => parse_datetime(s).map_or_else(|| ScalarValue::Text(s.clone()), ScalarValue::Date),
        other => date_literal(other).unwrap_or_else(|| ScalarValue::Text(other.to_string())),
    }
}

fn literal_scalar(value: &Value) -> ScalarValue {
    match value {
        Value::String(s) => ScalarValue::Text(s.clone()),
        other => stored_scalar(other),
    }
}

fn equals(stored: Option<&Value>, literal: &Value) -> bool {
    match stored {
        None | Some(Value::Null) => literal.is_null(),
        Some(stored) => {
            compare_same_type(&stored_scalar(stored), &literal_scalar(literal))
                == Some(Ordering::Equal)
        }
    }
}

fn compare(stored: Option<&Value>, literal: &Value) -> Option<Ordering> {
    let stored = stored.filter(|v| !v.is_null())?;
    if literal.is_null() {
        return None;
    }
    compare_same_type(&stored_scalar(stored), &literal_scalar(literal))
}

/// Orders two documents by a sort document; missing fields sort as
/// null.
#[must_use]
pub fn compare_documents(a: &Value, b: &Value, sort: &[(String, SortDirection)]) -> Ordering {
    sort.iter()
        .map(|(field, direction)| {
            let key = |doc: &Value| lookup_path(doc, field).map_or(ScalarValue::Null, stored_scalar);
            let ordering = compare_values(&key(a), &key(b));
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn doc() -> Value {
        json!({
            "id": "b",
            "name": "Garden Hose",
            "value": 30,
            "score": null,
            "createdAt": "2026-01-15T10:00:00Z",
            "profile": {"city": "Lyon"}
        })
    }

    #[rstest]
    #[case(json!({}), true)]
    #[case(json!({"value": 30}), true)]
    #[case(json!({"value": 30.0}), true)]
    #[case(json!({"value": "30"}), false)]
    #[case(json!({"value": {"$ne": 30}}), false)]
    #[case(json!({"missing": {"$ne": 1}}), true)]
    #[case(json!({"score": {"$ne": 1}}), true)]
    #[case(json!({"value": {"$gt": 10, "$lt": 40}}), true)]
    #[case(json!({"score": {"$gt": 0}}), false)]
    #[case(json!({"name": {"$gt": 5}}), false)]
    #[case(json!({"name": {"$regex": "hose", "$options": "i"}}), true)]
    #[case(json!({"name": {"$regex": "hose"}}), false)]
    #[case(json!({"value": {"$regex": "30", "$options": "i"}}), true)]
    #[case(json!({"value": {"$regex": "^3"}}), true)]
    #[case(json!({"profile": {"$regex": "Lyon"}}), false)]
    #[case(json!({"value": {"$type": "number"}}), true)]
    #[case(json!({"createdAt": {"$type": ["bool", "date"]}}), true)]
    #[case(json!({"name": {"$type": ["number"]}}), false)]
    #[case(json!({"missing": {"$type": "null"}}), false)]
    #[case(json!({"name": {"$not": {"$regex": "rake", "$options": "i"}}}), true)]
    #[case(json!({"missing": {"$not": {"$regex": "x"}}}), true)]
    #[case(json!({"profile.city": "Lyon"}), true)]
    #[case(json!({"createdAt": {"$gt": {"$date": "2026-01-15T09:59:59Z"}}}), true)]
    #[case(json!({"createdAt": {"$date": "2026-01-15T10:00:00.000Z"}}), true)]
    #[case(json!({"createdAt": "2026-01-15T10:00:00Z"}), false)]
    #[case(json!({"$or": [{"value": 1}, {"value": 30, "id": {"$gt": "a"}}]}), true)]
    #[case(json!({"$and": [{"value": 30}, {"id": {"$lt": "b"}}]}), false)]
    #[case(json!({"missing": {"$exists": false}}), true)]
    fn test_matches(#[case] filter: Value, #[case] expected: bool) {
        assert_eq!(matches(&doc(), &filter).unwrap(), expected, "{filter}");
    }

    #[rstest]
    #[case(json!({"$where": "1"}))]
    #[case(json!({"value": {"$in": [1]}}))]
    #[case(json!({"$or": {"value": 1}}))]
    #[case(json!([]))]
    #[case(json!({"value": {"$type": "decimal"}}))]
    #[case(json!({"value": {"$type": []}}))]
    fn test_rejects_unsupported_syntax(#[case] filter: Value) {
        assert!(matches!(
            matches(&doc(), &filter),
            Err(DocumentError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_compare_documents_sorts_nulls_first_then_breaks_ties() {
        let a = json!({"id": "a", "value": 1});
        let b = json!({"id": "b", "value": 1});
        let c = json!({"id": "c"});
        let sort = vec![
            ("value".to_owned(), SortDirection::Ascending),
            ("id".to_owned(), SortDirection::Ascending),
        ];

        assert_eq!(compare_documents(&a, &b, &sort), Ordering::Less);
        assert_eq!(compare_documents(&c, &a, &sort), Ordering::Less);
    }
}
