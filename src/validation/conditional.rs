//! Conditional Display
//!
//! Decides whether a field is shown, by comparing the answer of the field it
//! depends on against the rule's value. Comparisons follow the loose value
//! semantics answers were produced with: strict equality for `equals`,
//! string coercion for substring checks, numeric coercion for ordering.

use serde_json::Value;

use crate::domain::{ConditionOperator, ConditionalRule, FieldDefinition, ResponseData};

/// Whether the field is displayed for the given answers
pub fn is_displayed(field: &FieldDefinition, data: &ResponseData) -> bool {
    if field.is_hidden() {
        return false;
    }
    match &field.conditional_display {
        Some(rule) => evaluate(rule, data),
        None => true,
    }
}

/// Evaluate a conditional rule against the answers
pub fn evaluate(rule: &ConditionalRule, data: &ResponseData) -> bool {
    let dependent = data.get(&rule.depends_on);
    match rule.operator {
        ConditionOperator::Equals => strict_equals(dependent, &rule.value),
        ConditionOperator::NotEquals => !strict_equals(dependent, &rule.value),
        ConditionOperator::Contains => contains(dependent, &rule.value),
        ConditionOperator::NotContains => !contains(dependent, &rule.value),
        ConditionOperator::StartsWith => match dependent {
            Some(Value::String(s)) => s.starts_with(&to_js_string(Some(&rule.value))),
            _ => false,
        },
        ConditionOperator::EndsWith => match dependent {
            Some(Value::String(s)) => s.ends_with(&to_js_string(Some(&rule.value))),
            _ => false,
        },
        // NaN on either side makes both comparisons false
        ConditionOperator::GreaterThan => to_number(dependent) > to_number(Some(&rule.value)),
        ConditionOperator::LessThan => to_number(dependent) < to_number(Some(&rule.value)),
    }
}

/// Strict equality; a missing answer equals nothing, compound values equal nothing
fn strict_equals(left: Option<&Value>, right: &Value) -> bool {
    match (left, right) {
        (None, _) => false,
        (Some(Value::Null), Value::Null) => true,
        (Some(Value::Bool(a)), Value::Bool(b)) => a == b,
        (Some(Value::Number(a)), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Some(Value::String(a)), Value::String(b)) => a == b,
        _ => false,
    }
}

fn contains(dependent: Option<&Value>, needle: &Value) -> bool {
    match dependent {
        Some(Value::Array(items)) => items.iter().any(|item| strict_equals(Some(item), needle)),
        other => to_js_string(other).contains(&to_js_string(Some(needle))),
    }
}

/// String conversion of an answer
pub(crate) fn to_js_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => number_to_string(n),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_js_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

fn number_to_string(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Numeric conversion of an answer; `NaN` when it has no numeric reading
pub(crate) fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_numeric_string(s),
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => parse_numeric_string(&to_js_string(Some(single))),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_numeric_string(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // Rust accepts "inf"/"nan" spellings that are not numbers here
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}
