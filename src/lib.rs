//! Offline Forms Core
//!
//! Form runtime for devices that lose connectivity: templates are filled in
//! sessions with validation and autosave, responses land in a local SQLite
//! store, and a sync service uploads offline work and forwards responses to
//! their destinations once the device is back online.

pub mod config;
pub mod context;
pub mod domain;
pub mod registry;
pub mod repository;
pub mod runtime;
pub mod sync;
pub mod transfer;
pub mod validation;

pub use config::AppConfig;
pub use context::{init_logging, AppContext};
pub use domain::{DomainError, DomainResult, FormResponse, FormTemplate};
pub use runtime::{FormSession, Phase, SaveOutcome, SubmitOutcome};
pub use sync::{Connectivity, SyncEvent, SyncService};
pub use validation::{validate, FieldErrors, Validator};
