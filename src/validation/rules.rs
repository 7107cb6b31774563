//! Validation Rule Evaluation
//!
//! Each rule either passes or yields its configured message. Rules that do not
//! apply to the shape of the answer (a length rule on a number, say) pass.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use log::{debug, warn};
use regex::Regex;
use serde_json::Value;

use super::conditional::to_number;
use crate::domain::{ValidationKind, ValidationRule};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|_| unreachable!("static email pattern"))
});

/// Named check referenced by `custom` rules
pub type CustomCheck = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Answer absent, null or the empty string
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// True when the rule passes for the answer
pub(crate) fn passes(
    rule: &ValidationRule,
    value: Option<&Value>,
    custom: &HashMap<String, CustomCheck>,
) -> bool {
    match rule.kind {
        ValidationKind::Required => !is_empty_value(value),
        ValidationKind::MinLength => match (value, bound(rule)) {
            (Some(Value::String(s)), Some(min)) => (s.encode_utf16().count() as f64) >= min,
            _ => true,
        },
        ValidationKind::MaxLength => match (value, bound(rule)) {
            (Some(Value::String(s)), Some(max)) => (s.encode_utf16().count() as f64) <= max,
            _ => true,
        },
        ValidationKind::Min => match (value.and_then(Value::as_f64), bound(rule)) {
            (Some(n), Some(min)) => n >= min,
            _ => true,
        },
        ValidationKind::Max => match (value.and_then(Value::as_f64), bound(rule)) {
            (Some(n), Some(max)) => n <= max,
            _ => true,
        },
        ValidationKind::Pattern => match (value, rule.value.as_ref().and_then(Value::as_str)) {
            (Some(Value::String(s)), Some(pattern)) => match Regex::new(pattern) {
                Ok(re) => re.is_match(s),
                Err(e) => {
                    warn!("Skipping invalid pattern {:?}: {}", pattern, e);
                    true
                }
            },
            _ => true,
        },
        ValidationKind::Email => match value {
            Some(Value::String(s)) => EMAIL_RE.is_match(s),
            _ => true,
        },
        ValidationKind::Url => match value {
            Some(Value::String(s)) => reqwest::Url::parse(s).is_ok(),
            _ => true,
        },
        ValidationKind::Custom => {
            let Some(name) = rule.value.as_ref().and_then(Value::as_str) else {
                return true;
            };
            match (custom.get(name), value) {
                (Some(check), Some(value)) => check(value),
                (Some(check), None) => check(&Value::Null),
                (None, _) => {
                    debug!("No custom check registered as {:?}", name);
                    true
                }
            }
        }
    }
}

/// Numeric bound of a rule; `None` when the rule value is not numeric
fn bound(rule: &ValidationRule) -> Option<f64> {
    let n = to_number(rule.value.as_ref());
    if n.is_nan() {
        None
    } else {
        Some(n)
    }
}
