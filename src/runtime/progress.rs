//! Completion percentage of a form

use serde_json::Value;

use crate::domain::{FormTemplate, ResponseData};
use crate::validation::is_empty_value;

/// `floor(filled / eligible * 100)`; eligible fields are visible inputs
pub fn calculate(template: &FormTemplate, data: &ResponseData) -> u8 {
    let eligible: Vec<_> = template
        .fields
        .iter()
        .filter(|f| !f.is_hidden() && !f.kind.is_informational())
        .collect();
    if eligible.is_empty() {
        return 0;
    }

    let filled = eligible
        .iter()
        .filter(|f| is_filled(data.get(&f.name)))
        .count();

    (filled * 100 / eligible.len()).min(100) as u8
}

fn is_filled(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Array(items)) => !items.is_empty(),
        other => !is_empty_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldDefinition, FieldKind, SectionAttrs, TextAttrs};
    use serde_json::json;

    fn text(i: i64) -> FieldDefinition {
        FieldDefinition::new(format!("f{}", i), format!("Field {}", i), FieldKind::Text(TextAttrs::default()), i)
    }

    #[test]
    fn test_progress_excludes_headings_and_hidden() {
        let mut template = FormTemplate::new("t", "");
        for i in 0..7 {
            template.fields.push(text(i));
        }
        template.fields.push(FieldDefinition::new("h1", "Part 1", FieldKind::Heading(SectionAttrs::default()), 7));
        template.fields.push(FieldDefinition::new("h2", "Part 2", FieldKind::Heading(SectionAttrs::default()), 8));
        template.fields.push(text(9).hidden());

        let mut data = ResponseData::new();
        for i in 0..4 {
            data.insert(format!("f{}", i), json!("x"));
        }
        data.insert("f9".into(), json!("hidden answers do not count"));

        assert_eq!(calculate(&template, &data), 57);
    }

    #[test]
    fn test_empty_answers_are_not_progress() {
        let template = FormTemplate::new("t", "").with_field(text(1)).with_field(text(2));
        let data = json!({"f1": "", "f2": []}).as_object().cloned().unwrap();
        assert_eq!(calculate(&template, &data), 0);
    }

    #[test]
    fn test_no_eligible_fields() {
        assert_eq!(calculate(&FormTemplate::new("t", ""), &ResponseData::new()), 0);
    }
}
