//! Destinations
//!
//! External sinks a submitted response is forwarded to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Destination kind; unrecognized kinds are kept by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DestinationKind {
    Email,
    Api,
    Database,
    File,
    Other(String),
}

impl DestinationKind {
    pub fn as_str(&self) -> &str {
        match self {
            DestinationKind::Email => "email",
            DestinationKind::Api => "api",
            DestinationKind::Database => "database",
            DestinationKind::File => "file",
            DestinationKind::Other(name) => name,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "email" => DestinationKind::Email,
            "api" => DestinationKind::Api,
            "database" => DestinationKind::Database,
            "file" => DestinationKind::File,
            other => DestinationKind::Other(other.to_string()),
        }
    }
}

impl From<String> for DestinationKind {
    fn from(s: String) -> Self {
        DestinationKind::from_str(&s)
    }
}

impl From<DestinationKind> for String {
    fn from(kind: DestinationKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A configured sink with its opaque per-kind configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDestination {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DestinationKind,
    pub enabled: bool,
    #[serde(default)]
    pub config: Value,
}

impl FormDestination {
    pub fn new(id: i64, name: impl Into<String>, kind: DestinationKind, config: Value) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            enabled: true,
            config,
        }
    }

    /// String entry of the config object, if present
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_destination_kind_names() {
        assert_eq!(DestinationKind::from_str("api"), DestinationKind::Api);
        assert_eq!(DestinationKind::from_str("sms"), DestinationKind::Other("sms".into()));
        assert_eq!(DestinationKind::Other("sms".into()).as_str(), "sms");
    }

    #[test]
    fn test_destination_serialization() {
        let raw = json!({
            "id": 1,
            "name": "Webhook",
            "type": "api",
            "enabled": true,
            "config": {"url": "https://example.com/hook"}
        });
        let dest: FormDestination = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(dest.kind, DestinationKind::Api);
        assert_eq!(dest.config_str("url"), Some("https://example.com/hook"));
        assert_eq!(serde_json::to_value(&dest).unwrap(), raw);
    }
}
