//! Sync Layer
//!
//! Connectivity signal, lifecycle events, destination sinks and the service
//! that ties them to the response store.

mod connectivity;
mod destinations;
mod events;
mod service;

pub use connectivity::Connectivity;
pub use destinations::{
    ApiHandler, DatabaseHandler, DestinationHandler, DestinationRegistry, EmailHandler, FileHandler,
};
pub use events::{SyncEvent, SyncEventKind, SyncEvents, SyncListener};
pub use service::{DeliveryReport, SimulatedUploader, SyncService, Uploader};
