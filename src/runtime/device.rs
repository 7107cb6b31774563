//! Device snapshot attached to saved responses

use crate::domain::DeviceInfo;

pub trait DeviceInfoProvider: Send + Sync {
    fn device_info(&self) -> DeviceInfo;
}

/// Describes the machine the runtime is running on
#[derive(Debug, Clone)]
pub struct HostDeviceInfo {
    device_id: Option<String>,
    app_version: String,
}

impl HostDeviceInfo {
    pub fn new(device_id: Option<String>, app_version: impl Into<String>) -> Self {
        Self {
            device_id,
            app_version: app_version.into(),
        }
    }
}

impl DeviceInfoProvider for HostDeviceInfo {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            device_id: self.device_id.clone(),
            device_model: Some(format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)),
            os_version: Some(std::env::consts::OS.to_string()),
            app_version: Some(self.app_version.clone()),
            browser_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_device_info() {
        let info = HostDeviceInfo::new(Some("tablet-7".into()), "1.2.0").device_info();
        assert_eq!(info.device_id.as_deref(), Some("tablet-7"));
        assert_eq!(info.app_version.as_deref(), Some("1.2.0"));
        assert!(info.device_model.unwrap().contains(std::env::consts::ARCH));
    }
}
