//! Condition Evaluator
//!
//! Pure evaluation of field-comparison predicates against a subject record
//! plus a supplementary context map. No side effects, no I/O.
//!
//! Combination is a left-to-right fold with no precedence or grouping: the
//! logical operator attached to condition *i* governs how condition *i+1*
//! combines with the accumulator. An empty list always matches.

use serde_json::Value;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One predicate against the subject or the event context
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Condition {
    /// Field path, dot-addressed into the subject (context keys match exactly)
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
    /// Combines this condition's accumulator with the *next* condition
    #[serde(default)]
    pub logical: Option<LogicalOperator>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            logical: None,
        }
    }

    pub fn or_next(mut self) -> Self {
        self.logical = Some(LogicalOperator::Or);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
    NotIn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
}

/// Evaluate a condition list against `subject` and `context`.
///
/// Context keys take precedence over subject fields; unresolved paths
/// satisfy only `not_equals` and `not_in`.
pub fn evaluate(conditions: &[Condition], subject: &Value, context: &HashMap<String, Value>) -> bool {
    let mut acc = true;
    let mut combine = LogicalOperator::And;

    for condition in conditions {
        let actual = resolve_field(&condition.field, subject, context);
        let result = apply_operator(condition.operator, actual, &condition.value);

        acc = match combine {
            LogicalOperator::And => acc && result,
            LogicalOperator::Or => acc || result,
        };

        combine = condition.logical.unwrap_or(LogicalOperator::And);
    }

    acc
}

/// Resolve a field: exact context key first, then dot-path into the subject
fn resolve_field<'a>(
    field: &str,
    subject: &'a Value,
    context: &'a HashMap<String, Value>,
) -> Option<&'a Value> {
    if let Some(value) = context.get(field) {
        return Some(value);
    }

    let mut current = subject;
    for segment in field.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn apply_operator(operator: ConditionOperator, actual: Option<&Value>, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Equals => actual.map(|a| a == expected).unwrap_or(false),
        ConditionOperator::NotEquals => actual.map(|a| a != expected).unwrap_or(true),
        ConditionOperator::Contains => actual.map(|a| contains(a, expected)).unwrap_or(false),
        ConditionOperator::GreaterThan => compare_numeric(actual, expected, |a, b| a > b),
        ConditionOperator::LessThan => compare_numeric(actual, expected, |a, b| a < b),
        ConditionOperator::In => match (actual, expected) {
            (Some(a), Value::Array(set)) => set.contains(a),
            _ => false,
        },
        ConditionOperator::NotIn => match (actual, expected) {
            (Some(a), Value::Array(set)) => !set.contains(a),
            (None, Value::Array(_)) => true,
            (None, _) => true,
            _ => false,
        },
    }
}

/// Case-sensitive substring or array membership
fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(haystack) => expected
            .as_str()
            .map(|needle| haystack.contains(needle))
            .unwrap_or(false),
        Value::Array(items) => items.contains(expected),
        _ => false,
    }
}

fn compare_numeric(actual: Option<&Value>, expected: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    match (actual.and_then(as_number), as_number(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Coerce a JSON value to a number: numbers directly, numeric strings parsed
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
