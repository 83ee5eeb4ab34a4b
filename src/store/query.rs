//! Predicate compilation and matching
//!
//! Supports the operator subset the API accepts:
//! implicit equality, `$eq $ne $gt $gte $lt $lte $in $nin $exists`
//! and the logical `$and $or $nor`.

use std::cmp::Ordering;

use crate::store::StoreError;
use crate::value::{lookup, Document, Value};

/// A compiled predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    And(Vec<Query>),
    Or(Vec<Query>),
    Nor(Vec<Query>),
    Field { path: String, condition: Condition },
}

/// Condition on a single attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    All(Vec<Condition>),
}

impl Query {
    /// Compile a predicate object
    pub fn compile(predicate: &Value) -> Result<Query, StoreError> {
        let Value::Object(map) = predicate else {
            return Err(StoreError::InvalidQuery(format!(
                "predicate must be an object, got {predicate:?}"
            )));
        };

        let clauses = map
            .iter()
            .map(|(key, value)| match key.as_str() {
                "$and" => Ok(Query::And(compile_list(key, value)?)),
                "$or" => Ok(Query::Or(compile_list(key, value)?)),
                "$nor" => Ok(Query::Nor(compile_list(key, value)?)),
                op if op.starts_with('$') => Err(StoreError::InvalidQuery(format!(
                    "unsupported operator `{op}`"
                ))),
                path => Ok(Query::Field {
                    path: path.to_string(),
                    condition: Condition::compile(value)?,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Query::And(clauses))
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Query::And(clauses) => clauses.iter().all(|q| q.matches(doc)),
            Query::Or(clauses) => clauses.iter().any(|q| q.matches(doc)),
            Query::Nor(clauses) => !clauses.iter().any(|q| q.matches(doc)),
            Query::Field { path, condition } => condition.matches(lookup(doc, path)),
        }
    }
}

fn compile_list(op: &str, value: &Value) -> Result<Vec<Query>, StoreError> {
    match value {
        Value::Array(items) if !items.is_empty() => items.iter().map(Query::compile).collect(),
        _ => Err(StoreError::InvalidQuery(format!(
            "`{op}` expects a non-empty array"
        ))),
    }
}

impl Condition {
    fn compile(value: &Value) -> Result<Condition, StoreError> {
        let operators = match value {
            Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
            Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
                return Err(StoreError::InvalidQuery(
                    "cannot mix operators and fields in one condition".to_string(),
                ))
            }
            other => return Ok(Condition::Eq(other.clone())),
        };

        let conditions = operators
            .iter()
            .map(|(op, operand)| {
                Ok(match op.as_str() {
                    "$eq" => Condition::Eq(operand.clone()),
                    "$ne" => Condition::Ne(operand.clone()),
                    "$gt" => Condition::Gt(operand.clone()),
                    "$gte" => Condition::Gte(operand.clone()),
                    "$lt" => Condition::Lt(operand.clone()),
                    "$lte" => Condition::Lte(operand.clone()),
                    "$in" => Condition::In(array_operand(op, operand)?),
                    "$nin" => Condition::Nin(array_operand(op, operand)?),
                    "$exists" => match operand {
                        Value::Bool(b) => Condition::Exists(*b),
                        _ => {
                            return Err(StoreError::InvalidQuery(
                                "`$exists` expects a boolean".to_string(),
                            ))
                        }
                    },
                    other => {
                        return Err(StoreError::InvalidQuery(format!(
                            "unsupported operator `{other}`"
                        )))
                    }
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Condition::All(conditions))
    }

    /// Evaluate against the attribute's value (`None` when absent)
    pub fn matches(&self, found: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => equals(found, expected),
            Condition::Ne(expected) => !equals(found, expected),
            Condition::Gt(bound) => compares(found, bound, |o| o == Ordering::Greater),
            Condition::Gte(bound) => compares(found, bound, |o| o != Ordering::Less),
            Condition::Lt(bound) => compares(found, bound, |o| o == Ordering::Less),
            Condition::Lte(bound) => compares(found, bound, |o| o != Ordering::Greater),
            Condition::In(candidates) => candidates.iter().any(|c| equals(found, c)),
            Condition::Nin(candidates) => !candidates.iter().any(|c| equals(found, c)),
            Condition::Exists(expected) => found.is_some() == *expected,
            Condition::All(conditions) => conditions.iter().all(|c| c.matches(found)),
        }
    }
}

fn array_operand(op: &str, operand: &Value) -> Result<Vec<Value>, StoreError> {
    match operand {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(StoreError::InvalidQuery(format!("`{op}` expects an array"))),
    }
}

/// Equality; a missing attribute equals null, an array matches if any element does.
fn equals(found: Option<&Value>, expected: &Value) -> bool {
    match found {
        None => matches!(expected, Value::Null),
        Some(Value::Array(items)) => {
            items.iter().any(|item| item == expected) || found == Some(expected)
        }
        Some(value) => value == expected,
    }
}

/// Range comparison, only within the same kind of value.
fn compares(found: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |value: &Value| value.same_kind(bound) && accept(value.cmp_order(bound));
    match found {
        None => false,
        Some(Value::Array(items)) => items.iter().any(check),
        Some(value) => check(value),
    }
}
