//! Form Response Entity
//!
//! One person's answers for a template, with its lifecycle status.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::Entity;
use super::timestamp::{self, Timestamp};

/// Answers keyed by field name
pub type ResponseData = Map<String, Value>;

/// Lifecycle status of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    #[default]
    Draft,
    Submitted,
    Error,
    Syncing,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Draft => "draft",
            ResponseStatus::Submitted => "submitted",
            ResponseStatus::Error => "error",
            ResponseStatus::Syncing => "syncing",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "submitted" => ResponseStatus::Submitted,
            "error" => ResponseStatus::Error,
            "syncing" => ResponseStatus::Syncing,
            _ => ResponseStatus::Draft,
        }
    }

    /// A submitted response never goes back to draft
    pub fn can_become(&self, next: ResponseStatus) -> bool {
        !(*self != ResponseStatus::Draft && next == ResponseStatus::Draft)
    }
}

/// Snapshot of the device that produced a response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_type: Option<String>,
}

/// Position captured at submission time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// A form response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub form_template_id: i64,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<Timestamp>,
    #[serde(with = "timestamp")]
    pub created_at: Timestamp,
    #[serde(with = "timestamp")]
    pub updated_at: Timestamp,
    #[serde(default)]
    pub data: ResponseData,
    pub status: ResponseStatus,
    /// Created or submitted without connectivity; makes the response sync-eligible
    #[serde(default)]
    pub offline_created: bool,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_data: Option<LocationData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl FormResponse {
    /// Create an unsaved draft for a template
    pub fn draft(form_template_id: i64, data: ResponseData) -> Self {
        let now = timestamp::now();
        Self {
            id: None,
            form_template_id,
            submitted_at: None,
            created_at: now,
            updated_at: now,
            data,
            status: ResponseStatus::Draft,
            offline_created: false,
            synced_at: None,
            device_info: None,
            location_data: None,
            meta: None,
        }
    }

    /// Offline-created and submitted (or failed) responses still need syncing
    pub fn needs_sync(&self) -> bool {
        self.offline_created
            && matches!(self.status, ResponseStatus::Submitted | ResponseStatus::Error)
    }
}

impl Entity for FormResponse {
    type Id = i64;

    fn id(&self) -> Option<Self::Id> {
        self.id
    }
}

/// Partial update of a response; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePatch {
    pub data: Option<ResponseData>,
    pub status: Option<ResponseStatus>,
    pub submitted_at: Option<Timestamp>,
    pub offline_created: Option<bool>,
    pub synced_at: Option<Timestamp>,
    pub device_info: Option<DeviceInfo>,
    pub location_data: Option<LocationData>,
    pub meta: Option<Map<String, Value>>,
}

impl ResponsePatch {
    /// Apply onto a loaded response, refusing to move it back to draft
    pub fn apply_to(&self, response: &mut FormResponse) -> Result<(), String> {
        if let Some(status) = self.status {
            if !response.status.can_become(status) {
                return Err(format!(
                    "response {:?} is {} and cannot return to {}",
                    response.id,
                    response.status.as_str(),
                    status.as_str()
                ));
            }
            response.status = status;
        }
        if let Some(data) = &self.data {
            response.data = data.clone();
        }
        if let Some(ts) = self.submitted_at {
            response.submitted_at = Some(ts);
        }
        if let Some(flag) = self.offline_created {
            response.offline_created = flag;
        }
        if let Some(ts) = self.synced_at {
            response.synced_at = Some(ts);
        }
        if let Some(info) = &self.device_info {
            response.device_info = Some(info.clone());
        }
        if let Some(loc) = &self.location_data {
            response.location_data = Some(loc.clone());
        }
        if let Some(meta) = &self.meta {
            response.meta = Some(meta.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_transitions() {
        assert!(ResponseStatus::Draft.can_become(ResponseStatus::Submitted));
        assert!(ResponseStatus::Draft.can_become(ResponseStatus::Draft));
        assert!(ResponseStatus::Submitted.can_become(ResponseStatus::Error));
        assert!(!ResponseStatus::Submitted.can_become(ResponseStatus::Draft));
        assert!(!ResponseStatus::Error.can_become(ResponseStatus::Draft));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(ResponseStatus::Submitted.as_str(), "submitted");
        assert_eq!(ResponseStatus::from_str("syncing"), ResponseStatus::Syncing);
    }

    #[test]
    fn test_needs_sync() {
        let mut response = FormResponse::draft(1, ResponseData::new());
        response.offline_created = true;
        assert!(!response.needs_sync());

        response.status = ResponseStatus::Submitted;
        assert!(response.needs_sync());

        response.offline_created = false;
        assert!(!response.needs_sync());
    }

    #[test]
    fn test_patch_refuses_resurrection() {
        let mut response = FormResponse::draft(1, ResponseData::new());
        response.status = ResponseStatus::Submitted;

        let patch = ResponsePatch {
            status: Some(ResponseStatus::Draft),
            ..Default::default()
        };
        assert!(patch.apply_to(&mut response).is_err());
        assert_eq!(response.status, ResponseStatus::Submitted);
    }

    #[test]
    fn test_response_json_round_trip() {
        let raw = json!({
            "id": 42,
            "formTemplateId": 7,
            "submittedAt": "2024-05-01T10:15:00.250Z",
            "createdAt": "2024-05-01T10:00:00.000Z",
            "updatedAt": "2024-05-01T10:15:00.250Z",
            "data": {"age": 30, "tags": ["a", "b"], "notes": null},
            "status": "submitted",
            "offlineCreated": true,
            "deviceInfo": {"deviceId": "abc", "appVersion": "1.0.0"},
            "locationData": {"latitude": 52.5, "longitude": 13.4, "accuracy": 12.0, "timestamp": 1714557300250i64}
        });
        let response: FormResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(response.id(), Some(42));
        assert_eq!(serde_json::to_value(&response).unwrap(), raw);
    }
}
