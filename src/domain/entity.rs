//! Domain Layer - Core Entity Trait
//!
//! This trait defines the basic contract for all persisted entities.
//! Entities get their ID from the store, so it is absent until created.

use serde::{Deserialize, Serialize};

/// Core trait for all domain entities
pub trait Entity: Sized + Send + Sync + Clone {
    /// The type of the entity's unique identifier
    type Id: Copy + Eq + std::hash::Hash + Send + Sync;

    /// Returns the entity's identifier, `None` before the first insert
    fn id(&self) -> Option<Self::Id>;
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse error classification shown to callers and listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorKind {
    Network,
    Auth,
    Database,
    Validation,
    Unknown,
}

/// Domain-level errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainError {
    NotFound(String),
    InvalidInput(String),
    Conflict(String),
    Network(String),
    Auth(String),
    Database(String),
    Validation(String),
    Unknown(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Network(_) => ErrorKind::Network,
            DomainError::Auth(_) => ErrorKind::Auth,
            DomainError::Database(_) | DomainError::NotFound(_) | DomainError::Conflict(_) => {
                ErrorKind::Database
            }
            DomainError::Validation(_) | DomainError::InvalidInput(_) => ErrorKind::Validation,
            DomainError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Message suitable for showing to the person filling the form
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Network => {
                "Network connection issue. Please check your internet connection and try again."
                    .to_string()
            }
            ErrorKind::Auth => "Authentication error. Please sign in again.".to_string(),
            ErrorKind::Database => "Database error. Please try again later.".to_string(),
            ErrorKind::Validation => {
                let msg = self.message();
                if msg.is_empty() {
                    "Invalid input. Please check your information and try again.".to_string()
                } else {
                    msg.to_string()
                }
            }
            ErrorKind::Unknown => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    /// The raw message carried by the variant
    pub fn message(&self) -> &str {
        match self {
            DomainError::NotFound(msg)
            | DomainError::InvalidInput(msg)
            | DomainError::Conflict(msg)
            | DomainError::Network(msg)
            | DomainError::Auth(msg)
            | DomainError::Database(msg)
            | DomainError::Validation(msg)
            | DomainError::Unknown(msg) => msg,
        }
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DomainError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            DomainError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DomainError::Network(msg) => write!(f, "Network error: {}", msg),
            DomainError::Auth(msg) => write!(f, "Auth error: {}", msg),
            DomainError::Database(msg) => write!(f, "Database error: {}", msg),
            DomainError::Validation(msg) => write!(f, "Validation error: {}", msg),
            DomainError::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::InvalidInput(e.to_string())
    }
}

impl From<reqwest::Error> for DomainError {
    fn from(e: reqwest::Error) -> Self {
        DomainError::Network(e.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Unknown(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(DomainError::NotFound("x".into()).kind(), ErrorKind::Database);
        assert_eq!(DomainError::Network("x".into()).kind(), ErrorKind::Network);
        assert_eq!(DomainError::InvalidInput("x".into()).kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_user_message() {
        let err = DomainError::Validation("Age is required".into());
        assert_eq!(err.user_message(), "Age is required");

        let err = DomainError::Database("disk I/O error".into());
        assert_eq!(err.user_message(), "Database error. Please try again later.");
    }

    #[test]
    fn test_display() {
        let err = DomainError::Conflict("response 3 already submitted".into());
        assert_eq!(err.to_string(), "Conflict: response 3 already submitted");
    }
}
