//! One-shot position capture
//!
//! Capture never fails a submission: every failure is logged and becomes
//! "no location".

use std::time::Duration;

use async_trait::async_trait;
use log::warn;

use crate::domain::LocationData;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Zero means a fresh reading is required
    pub max_cached_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            max_cached_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub timestamp_ms: i64,
}

impl From<Position> for LocationData {
    fn from(p: Position) -> Self {
        LocationData {
            latitude: p.latitude,
            longitude: p.longitude,
            accuracy: p.accuracy,
            timestamp: p.timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeolocationError {
    PermissionDenied,
    Timeout,
    Unsupported,
    Other(String),
}

impl std::fmt::Display for GeolocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeolocationError::PermissionDenied => write!(f, "permission denied"),
            GeolocationError::Timeout => write!(f, "timed out"),
            GeolocationError::Unsupported => write!(f, "geolocation is not supported"),
            GeolocationError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for GeolocationError {}

#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self, options: PositionOptions) -> Result<Position, GeolocationError>;
}

/// Provider for hosts without a location source
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeolocation;

#[async_trait]
impl GeolocationProvider for NoGeolocation {
    async fn current_position(&self, _options: PositionOptions) -> Result<Position, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// Provider that always reports the same place, e.g. a kiosk at a fixed site
#[derive(Debug, Clone)]
pub struct FixedGeolocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

#[async_trait]
impl GeolocationProvider for FixedGeolocation {
    async fn current_position(&self, _options: PositionOptions) -> Result<Position, GeolocationError> {
        Ok(Position {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        })
    }
}

/// Ask the provider for a position, giving up after `options.timeout`
pub async fn capture(provider: &dyn GeolocationProvider, options: PositionOptions) -> Option<LocationData> {
    match tokio::time::timeout(options.timeout, provider.current_position(options)).await {
        Ok(Ok(position)) => Some(position.into()),
        Ok(Err(e)) => {
            warn!("Error getting location: {}", e);
            None
        }
        Err(_) => {
            warn!("Error getting location: {}", GeolocationError::Timeout);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hanging;

    #[async_trait]
    impl GeolocationProvider for Hanging {
        async fn current_position(&self, _options: PositionOptions) -> Result<Position, GeolocationError> {
            std::future::pending().await
        }
    }

    struct Denied;

    #[async_trait]
    impl GeolocationProvider for Denied {
        async fn current_position(&self, _options: PositionOptions) -> Result<Position, GeolocationError> {
            Err(GeolocationError::PermissionDenied)
        }
    }

    #[tokio::test]
    async fn test_capture_success() {
        let provider = FixedGeolocation {
            latitude: 52.52,
            longitude: 13.405,
            accuracy: Some(8.0),
        };
        let location = capture(&provider, PositionOptions::default()).await.unwrap();
        assert_eq!(location.latitude, 52.52);
        assert_eq!(location.accuracy, Some(8.0));
    }

    #[tokio::test]
    async fn test_capture_failures_become_none() {
        assert!(capture(&NoGeolocation, PositionOptions::default()).await.is_none());
        assert!(capture(&Denied, PositionOptions::default()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_times_out() {
        let started = tokio::time::Instant::now();
        assert!(capture(&Hanging, PositionOptions::default()).await.is_none());
        assert!(started.elapsed() >= Duration::from_secs(10));
    }
}
