//! Form Template Entity
//!
//! A named definition of a form's fields and settings. Templates are owned by
//! the admin side; the runtime only reads them.

use serde::{Deserialize, Serialize};

use super::destination::FormDestination;
use super::entity::Entity;
use super::field::FieldDefinition;
use super::timestamp::{self, Timestamp};

/// Behaviour switches of a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSettings {
    #[serde(default)]
    pub allow_offline_submission: bool,
    #[serde(default)]
    pub require_signature: bool,
    /// Submit even when validation reports errors
    #[serde(default)]
    pub allow_incomplete: bool,
    #[serde(default)]
    pub show_progress_bar: bool,
    #[serde(default)]
    pub auto_save: bool,
    #[serde(default)]
    pub allow_image_upload: bool,
    #[serde(default)]
    pub allow_geolocation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, rename = "customCSS", skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destinations: Option<Vec<FormDestination>>,
}

impl FormSettings {
    pub fn destinations(&self) -> &[FormDestination] {
        self.destinations.as_deref().unwrap_or(&[])
    }
}

/// A form template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "timestamp")]
    pub created_at: Timestamp,
    #[serde(with = "timestamp")]
    pub updated_at: Timestamp,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub settings: FormSettings,
}

impl FormTemplate {
    /// Create an unsaved template; the store assigns id and timestamps
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = timestamp::now();
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
            fields: Vec::new(),
            settings: FormSettings::default(),
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_settings(mut self, settings: FormSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields in render order; ties keep their list position
    pub fn ordered_fields(&self) -> Vec<&FieldDefinition> {
        let mut fields: Vec<&FieldDefinition> = self.fields.iter().collect();
        fields.sort_by_key(|f| f.order);
        fields
    }

    /// Names that appear more than once in the field list
    pub fn duplicate_names(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut dups = Vec::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) && !dups.contains(&field.name) {
                dups.push(field.name.clone());
            }
        }
        dups
    }
}

impl Entity for FormTemplate {
    type Id = i64;

    fn id(&self) -> Option<Self::Id> {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::{FieldKind, SectionAttrs, TextAttrs};

    #[test]
    fn test_template_creation() {
        let template = FormTemplate::new("Inspection", "Daily equipment check");
        assert!(template.id().is_none());
        assert_eq!(template.created_at, template.updated_at);
        assert!(template.fields.is_empty());
    }

    #[test]
    fn test_ordered_fields() {
        let template = FormTemplate::new("t", "")
            .with_field(FieldDefinition::new("b", "B", FieldKind::Text(TextAttrs::default()), 2))
            .with_field(FieldDefinition::new("a", "A", FieldKind::Section(SectionAttrs::default()), 1));
        let names: Vec<&str> = template.ordered_fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_names() {
        let template = FormTemplate::new("t", "")
            .with_field(FieldDefinition::new("a", "A", FieldKind::default(), 1))
            .with_field(FieldDefinition::new("a", "A2", FieldKind::default(), 2));
        assert_eq!(template.duplicate_names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_settings_custom_css_key() {
        let settings = FormSettings {
            custom_css: Some("body{}".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["customCSS"], "body{}");
    }

    #[test]
    fn test_template_json_round_trip() {
        let raw = serde_json::json!({
            "id": 7,
            "name": "Site visit",
            "description": "Visit report",
            "createdAt": "2024-03-05T08:09:10.120Z",
            "updatedAt": "2024-03-06T17:00:00.000Z",
            "fields": [
                {
                    "label": "Visit date",
                    "name": "visitDate",
                    "required": true,
                    "order": 1,
                    "type": "date",
                    "minDate": "2024-01-01T00:00:00.000Z",
                    "maxDate": "2024-12-31T23:59:59.999Z"
                },
                {
                    "id": "f-2",
                    "label": "Crew size",
                    "name": "crew",
                    "required": false,
                    "order": 2,
                    "helpText": "People on site",
                    "defaultValue": 2,
                    "validations": [
                        { "type": "min", "value": 1, "message": "At least one" },
                        { "type": "max", "value": 40, "message": "Too many" }
                    ],
                    "type": "number",
                    "min": 1,
                    "max": 40,
                    "step": 0.5
                },
                {
                    "label": "Weather",
                    "name": "weather",
                    "required": false,
                    "order": 3,
                    "isHidden": false,
                    "conditionalDisplay": { "dependsOn": "crew", "operator": "greaterThan", "value": 0 },
                    "type": "select",
                    "options": [
                        { "label": "Sunny", "value": "sun" },
                        { "label": "Rain", "value": "rain" }
                    ],
                    "allowOther": true
                }
            ],
            "settings": {
                "allowOfflineSubmission": true,
                "requireSignature": false,
                "allowIncomplete": false,
                "showProgressBar": true,
                "autoSave": true,
                "allowImageUpload": false,
                "allowGeolocation": true,
                "theme": "dark",
                "customCSS": "body{}",
                "destinations": [
                    {
                        "id": 3,
                        "name": "Webhook",
                        "type": "api",
                        "enabled": true,
                        "config": { "endpoint": "https://example.com/hook", "method": "PUT" }
                    },
                    { "id": 4, "name": "Archive", "type": "ftp", "enabled": false, "config": {} }
                ]
            }
        });

        let template: FormTemplate = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(template.fields.len(), 3);
        assert_eq!(template.settings.destinations().len(), 2);
        assert_eq!(serde_json::to_value(&template).unwrap(), raw);
    }
}
