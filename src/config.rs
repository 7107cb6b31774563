//! Application configuration
//!
//! A camelCase JSON file next to the database. Every key is optional; missing
//! keys take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainResult};
use crate::runtime::PositionOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_max_files: usize,
    pub autosave_delay_ms: u64,
    pub geolocation_timeout_ms: u64,
    pub geolocation_high_accuracy: bool,
    pub sync_upload_delay_ms: u64,
    pub destination_timeout_ms: u64,
    pub app_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("forms.db"),
            log_dir: PathBuf::from("logs"),
            log_max_files: 7,
            autosave_delay_ms: 5000,
            geolocation_timeout_ms: 10_000,
            geolocation_high_accuracy: true,
            sync_upload_delay_ms: 500,
            destination_timeout_ms: 10_000,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            device_id: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> DomainResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DomainError::NotFound(format!("Config {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| DomainError::InvalidInput(format!("Config {}: {}", path.display(), e)))
    }

    /// Defaults when the file does not exist; a malformed file is still an error
    pub fn load_or_default(path: &Path) -> DomainResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> DomainResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn sync_upload_delay(&self) -> Duration {
        Duration::from_millis(self.sync_upload_delay_ms)
    }

    pub fn destination_timeout(&self) -> Duration {
        Duration::from_millis(self.destination_timeout_ms)
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: self.geolocation_high_accuracy,
            timeout: Duration::from_millis(self.geolocation_timeout_ms),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"autosaveDelayMs": 1500, "deviceId": "tablet-7"}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.autosave_delay(), Duration::from_millis(1500));
        assert_eq!(config.device_id.as_deref(), Some("tablet-7"));
        assert_eq!(config.log_max_files, 7);
        assert_eq!(config.position_options().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(AppConfig::load(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            geolocation_high_accuracy: false,
            ..Default::default()
        };

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "autosave = 5").unwrap();
        assert!(matches!(AppConfig::load_or_default(&path), Err(DomainError::InvalidInput(_))));
    }
}
