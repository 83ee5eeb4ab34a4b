//! Filter normalization
//!
//! Turns a caller-supplied filter (a JSON object or a URI-encoded JSON string)
//! into a storage-ready predicate:
//! - string leaves that parse as ids become native [`Value::Id`]s
//! - soft-deleted records are always excluded

use percent_encoding::percent_decode_str;
use uuid::Uuid;

use crate::value::{Document, Value};
use crate::{GraphQLError, Result};

/// Attribute marking a record as logically removed
pub const DELETED_FIELD: &str = "deleted";

/// Raw filter as received from a query argument
#[derive(Debug, Clone, PartialEq)]
pub enum FilterInput {
    /// URI-encoded JSON (the `filter: String` argument)
    Encoded(String),
    /// Structured JSON (the `filterObject` argument)
    Object(serde_json::Value),
}

/// Normalize a filter and combine it with the soft-delete exclusion.
///
/// The input is consumed and a fresh predicate tree is built, so nothing the
/// caller holds is aliased by the result.
pub fn setup_filter(input: Option<FilterInput>) -> Result<Value> {
    let json = match input {
        None => serde_json::Value::Null,
        Some(FilterInput::Encoded(raw)) => decode_filter(&raw)?,
        Some(FilterInput::Object(json)) => json,
    };

    let predicate = match json {
        serde_json::Value::Null => Document::new(),
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (key, coerce_ids(value)))
            .collect(),
        other => {
            return Err(GraphQLError::InvalidFilter(format!(
                "filter must be a JSON object, got {other}"
            )))
        }
    };

    Ok(exclude_deleted(predicate))
}

fn decode_filter(raw: &str) -> Result<serde_json::Value> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| GraphQLError::InvalidFilter(e.to_string()))?;
    if decoded.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&decoded).map_err(|e| GraphQLError::InvalidFilter(e.to_string()))
}

/// Recursively reinterpret string leaves as native ids where they parse as one.
///
/// Operator keys and field keys are treated alike; only leaves are touched.
pub fn coerce_ids(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::String(s) => match Uuid::parse_str(&s) {
            Ok(id) => Value::Id(id),
            Err(_) => {
                tracing::trace!(value = %s, "filter value is not an id, matching as string");
                Value::String(s)
            }
        },
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(coerce_ids).collect()),
        serde_json::Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, coerce_ids(v))).collect())
        }
        other => Value::from(other),
    }
}

/// `deleted == false OR deleted is absent`
pub fn not_deleted_clause() -> Value {
    Value::object([(
        "$or",
        Value::Array(vec![
            Value::object([(DELETED_FIELD, Value::Bool(false))]),
            Value::object([(
                DELETED_FIELD,
                Value::object([("$exists", Value::Bool(false))]),
            )]),
        ]),
    )])
}

fn exclude_deleted(predicate: Document) -> Value {
    if predicate.is_empty() {
        not_deleted_clause()
    } else {
        Value::object([(
            "$and",
            Value::Array(vec![Value::Object(predicate), not_deleted_clause()]),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clauses(filter: &Value) -> &[Value] {
        match filter {
            Value::Object(map) => match map.get("$and") {
                Some(Value::Array(items)) => items,
                other => panic!("expected $and, got {other:?}"),
            },
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_filter_only_excludes_deleted() {
        let filter = setup_filter(None).unwrap();
        assert_eq!(filter, not_deleted_clause());
    }

    #[test]
    fn test_null_and_empty_inputs() {
        let from_null = setup_filter(Some(FilterInput::Object(json!(null)))).unwrap();
        assert_eq!(from_null, not_deleted_clause());

        let from_empty_object = setup_filter(Some(FilterInput::Object(json!({})))).unwrap();
        assert_eq!(from_empty_object, not_deleted_clause());

        let from_empty_string = setup_filter(Some(FilterInput::Encoded(String::new()))).unwrap();
        assert_eq!(from_empty_string, not_deleted_clause());
    }

    #[test]
    fn test_encoded_filter_is_uri_decoded() {
        let raw = "%7B%22title%22%3A%22Draft%201%22%7D";
        let filter = setup_filter(Some(FilterInput::Encoded(raw.into()))).unwrap();

        let parts = clauses(&filter);
        assert_eq!(parts[0], Value::object([("title", Value::from("Draft 1"))]));
        assert_eq!(parts[1], not_deleted_clause());
    }

    #[test]
    fn test_unparseable_filter_is_rejected() {
        let err = setup_filter(Some(FilterInput::Encoded("{title:".into()))).unwrap_err();
        assert!(matches!(err, GraphQLError::InvalidFilter(_)));

        let err = setup_filter(Some(FilterInput::Object(json!([1, 2])))).unwrap_err();
        assert!(matches!(err, GraphQLError::InvalidFilter(_)));
    }

    #[test]
    fn test_ids_are_coerced_recursively() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let filter = setup_filter(Some(FilterInput::Object(json!({
            "ownerId": owner.to_string(),
            "documentId": { "$in": [other.to_string(), "not-an-id"] },
            "activity.clientId": "abc123",
        }))))
        .unwrap();

        let Value::Object(predicate) = &clauses(&filter)[0] else {
            panic!("expected object predicate");
        };
        assert!(matches!(predicate.get("ownerId"), Some(Value::Id(id)) if *id == owner));
        assert!(matches!(predicate.get("activity.clientId"), Some(Value::String(s)) if s == "abc123"));
        assert_eq!(
            predicate.get("documentId"),
            Some(&Value::object([(
                "$in",
                Value::Array(vec![Value::Id(other), Value::from("not-an-id")])
            )]))
        );
    }

    #[test]
    fn test_caller_input_is_not_mutated() {
        let id = Uuid::new_v4();
        let original = json!({ "nested": { "ownerId": id.to_string() } });
        let input = original.clone();

        setup_filter(Some(FilterInput::Object(input.clone()))).unwrap();

        assert_eq!(input, original);
    }
}
