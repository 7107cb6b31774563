//! JSON export and import
//!
//! Templates and responses leave the device as the same camelCase JSON the
//! store persists, with ISO-8601 dates and numeric ids preserved.

use log::error;
use serde_json::Value;

use crate::domain::{timestamp, DomainError, DomainResult, FormResponse, FormTemplate};
use crate::repository::TemplateStore;

/// Pretty-printed template JSON
pub fn export_template_json(template: &FormTemplate) -> DomainResult<String> {
    Ok(serde_json::to_string_pretty(template)?)
}

/// Pretty-printed array of responses
pub fn export_responses_json(responses: &[FormResponse]) -> DomainResult<String> {
    Ok(serde_json::to_string_pretty(responses)?)
}

pub fn parse_template(json: &str) -> DomainResult<FormTemplate> {
    Ok(serde_json::from_str(json)?)
}

pub fn parse_response(json: &str) -> DomainResult<FormResponse> {
    Ok(serde_json::from_str(json)?)
}

/// Turn exported JSON into a template ready to insert: any id is dropped and
/// both timestamps are reset to now.
fn prepare_import(json: &str) -> Result<FormTemplate, serde_json::Error> {
    let mut raw: Value = serde_json::from_str(json)?;
    if let Value::Object(map) = &mut raw {
        let now = Value::String(timestamp::format(&timestamp::now()));
        map.remove("id");
        map.insert("createdAt".to_string(), now.clone());
        map.insert("updatedAt".to_string(), now);
    }
    serde_json::from_value(raw)
}

/// Store a template from exported JSON as a new row
pub async fn import_template_json(store: &dyn TemplateStore, json: &str) -> DomainResult<FormTemplate> {
    let template = prepare_import(json).map_err(|e| {
        error!("Failed to import template: {}", e);
        DomainError::InvalidInput("Invalid template format".to_string())
    })?;
    store.create(&template).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldDefinition, FieldKind, FormSettings, ResponseStatus, TextAttrs};
    use crate::repository::{init_db, Repository, TemplateRepository};
    use serde_json::json;
    use std::path::PathBuf;

    async fn setup_templates() -> TemplateRepository {
        let db = init_db(&PathBuf::from(":memory:")).await.expect("Failed to init test DB");
        TemplateRepository::new(db.connection())
    }

    #[tokio::test]
    async fn test_export_then_import_creates_new_template() {
        let store = setup_templates().await;
        let original = store
            .create(
                &FormTemplate::new("Inspection", "Weekly")
                    .with_field(FieldDefinition::new("site", "Site", FieldKind::Text(TextAttrs::default()), 1).required())
                    .with_settings(FormSettings {
                        auto_save: true,
                        ..Default::default()
                    }),
            )
            .await
            .unwrap();

        let exported = export_template_json(&original).unwrap();
        assert!(exported.contains("\"autoSave\": true"));

        let imported = import_template_json(&store, &exported).await.unwrap();
        assert_ne!(imported.id, original.id);
        assert_eq!(imported.name, original.name);
        assert_eq!(imported.fields, original.fields);
        assert_eq!(imported.settings, original.settings);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_without_timestamps() {
        let store = setup_templates().await;
        let json = r#"{"name": "Bare", "fields": [{"name": "q", "label": "Q", "type": "text", "required": false, "order": 1}], "settings": {}}"#;

        let imported = import_template_json(&store, json).await.unwrap();
        assert_eq!(imported.name, "Bare");
        assert_eq!(imported.fields.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_import_is_rejected() {
        let store = setup_templates().await;
        let result = import_template_json(&store, "{not json").await;
        assert_eq!(result, Err(DomainError::InvalidInput("Invalid template format".to_string())));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_response_json_round_trip() {
        let raw = json!({
            "id": 4,
            "formTemplateId": 2,
            "submittedAt": "2024-03-01T10:15:30.250Z",
            "createdAt": "2024-03-01T10:00:00.000Z",
            "updatedAt": "2024-03-01T10:15:30.250Z",
            "data": {"site": "North yard", "age": 42},
            "status": "submitted",
            "offlineCreated": true,
            "deviceInfo": {"deviceModel": "linux-x86_64", "osVersion": "linux", "appVersion": "1.0.0"}
        });

        let response = parse_response(&raw.to_string()).unwrap();
        assert_eq!(response.status, ResponseStatus::Submitted);
        assert_eq!(response.id, Some(4));

        let exported = export_responses_json(std::slice::from_ref(&response)).unwrap();
        let back: Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(back, json!([raw]));
    }
}
