//! Validation Engine
//!
//! Checks a template's fields against the current answers and collects one
//! message per failing field. Validation failures are data, never errors.

mod conditional;
mod rules;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::domain::{FormTemplate, ResponseData, ValidationKind};

pub use conditional::{evaluate, is_displayed};
pub use rules::{is_empty_value, CustomCheck};

/// Error message per field name; empty means valid
pub type FieldErrors = BTreeMap<String, String>;

/// Validator with an optional set of named checks for `custom` rules
#[derive(Clone, Default)]
pub struct Validator {
    custom: HashMap<String, CustomCheck>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named check used by `custom` rules whose value is `name`
    pub fn with_check<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Arc::new(check));
        self
    }

    pub fn validate(&self, template: &FormTemplate, data: &ResponseData) -> FieldErrors {
        let mut errors = FieldErrors::new();

        for field in template.ordered_fields() {
            if field.is_hidden() || field.kind.is_informational() || !is_displayed(field, data) {
                continue;
            }

            let value = data.get(&field.name);
            let empty = is_empty_value(value);

            if field.required && empty {
                errors.insert(field.name.clone(), format!("{} is required", field.label));
                continue;
            }

            let failed = field.rules().iter().find(|rule| {
                if empty && !field.required && rule.kind != ValidationKind::Required {
                    return false;
                }
                !rules::passes(rule, value, &self.custom)
            });
            if let Some(rule) = failed {
                errors.insert(field.name.clone(), rule.message.clone());
            }
        }

        errors
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Validate with the built-in rules only
pub fn validate(template: &FormTemplate, data: &ResponseData) -> FieldErrors {
    Validator::new().validate(template, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ConditionOperator, ConditionalRule, FieldDefinition, FieldKind, NumberAttrs, SectionAttrs,
        TextAttrs, ValidationRule,
    };
    use serde_json::json;

    fn text(name: &str, label: &str, order: i64) -> FieldDefinition {
        FieldDefinition::new(name, label, FieldKind::Text(TextAttrs::default()), order)
    }

    fn answers(value: Value) -> ResponseData {
        value.as_object().cloned().unwrap()
    }

    fn age_template() -> FormTemplate {
        FormTemplate::new("Signup", "").with_field(
            FieldDefinition::new("age", "Age", FieldKind::Number(NumberAttrs::default()), 1)
                .required()
                .with_rule(ValidationRule::new(ValidationKind::Min, Some(json!(18)), "Must be 18+")),
        )
    }

    #[test]
    fn test_min_rule_message() {
        let errors = validate(&age_template(), &answers(json!({"age": 15})));
        assert_eq!(errors.get("age").map(String::as_str), Some("Must be 18+"));

        let errors = validate(&age_template(), &answers(json!({"age": 21})));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_required_wins_over_rules() {
        let errors = validate(&age_template(), &ResponseData::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("age").map(String::as_str), Some("Age is required"));

        let errors = validate(&age_template(), &answers(json!({"age": null})));
        assert_eq!(errors.get("age").map(String::as_str), Some("Age is required"));
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let template = FormTemplate::new("t", "").with_field(
            text("code", "Code", 1)
                .with_rule(ValidationRule::new(ValidationKind::MinLength, Some(json!(5)), "too short"))
                .with_rule(ValidationRule::new(ValidationKind::Pattern, Some(json!("^\\d+$")), "digits only"))
                .with_rule(ValidationRule::new(ValidationKind::Custom, Some(json!("boom")), "never")),
        );
        let validator = Validator::new().with_check("boom", |_| panic!("later rules must not run"));

        let errors = validator.validate(&template, &answers(json!({"code": "ab"})));
        assert_eq!(errors.get("code").map(String::as_str), Some("too short"));

        let errors = validator.validate(&template, &answers(json!({"code": "abcdef"})));
        assert_eq!(errors.get("code").map(String::as_str), Some("digits only"));
    }

    #[test]
    fn test_optional_empty_field_skips_rules() {
        let template = FormTemplate::new("t", "").with_field(
            text("email", "Email", 1).with_rule(ValidationRule::new(ValidationKind::Email, None, "bad email")),
        );
        assert!(validate(&template, &ResponseData::new()).is_empty());
        assert!(validate(&template, &answers(json!({"email": ""}))).is_empty());

        let errors = validate(&template, &answers(json!({"email": "nope"})));
        assert_eq!(errors.get("email").map(String::as_str), Some("bad email"));
    }

    #[test]
    fn test_required_rule_runs_on_empty_value() {
        let template = FormTemplate::new("t", "").with_field(
            text("note", "Note", 1).with_rule(ValidationRule::new(ValidationKind::Required, None, "Say something")),
        );
        let errors = validate(&template, &ResponseData::new());
        assert_eq!(errors.get("note").map(String::as_str), Some("Say something"));
    }

    #[test]
    fn test_conditionally_excluded_field_is_not_required() {
        let template = FormTemplate::new("Inspection", "")
            .with_field(FieldDefinition::new(
                "hasIssues",
                "Has issues",
                FieldKind::Checkbox(Default::default()),
                1,
            ))
            .with_field(text("details", "Details", 2).required().shown_when(ConditionalRule {
                depends_on: "hasIssues".into(),
                operator: ConditionOperator::Equals,
                value: json!(true),
            }));

        assert!(validate(&template, &answers(json!({"hasIssues": false}))).is_empty());

        let errors = validate(&template, &answers(json!({"hasIssues": true})));
        assert_eq!(errors.get("details").map(String::as_str), Some("Details is required"));
    }

    #[test]
    fn test_hidden_and_informational_fields() {
        let template = FormTemplate::new("t", "")
            .with_field(text("secret", "Secret", 1).required().hidden())
            .with_field(FieldDefinition::new(
                "intro",
                "Intro",
                FieldKind::Section(SectionAttrs::default()),
                2,
            ).required());
        assert!(validate(&template, &ResponseData::new()).is_empty());
    }
}
