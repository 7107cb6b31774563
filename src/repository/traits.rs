//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for data access.
//! The runtime and sync service only see these traits, so any backend that
//! hands out stable integer ids and durable writes can stand in for SQLite.

use async_trait::async_trait;

use super::query::{Page, PageRequest, ResponseQuery};
use crate::domain::{DomainResult, Entity, FormResponse, FormTemplate, ResponsePatch};

/// Core repository trait for CRUD operations
///
/// Generic over any Entity type. A missing row is `Ok(None)`, never an error.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Create a new entity; the store assigns id and timestamps
    async fn create(&self, entity: &T) -> DomainResult<T>;

    /// Find entity by ID
    async fn find_by_id(&self, id: T::Id) -> DomainResult<Option<T>>;

    /// List all entities in id order
    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Replace an existing entity, bumping `updatedAt`
    async fn update(&self, entity: &T) -> DomainResult<Option<T>>;

    /// Delete entity by ID; deleting a missing row succeeds
    async fn delete(&self, id: T::Id) -> DomainResult<()>;
}

/// Extension for repositories that support text search
#[async_trait]
pub trait SearchableRepository<T: Entity>: Repository<T> {
    /// Search entities by text query
    async fn search(&self, query: &str) -> DomainResult<Vec<T>>;
}

/// Template collection
#[async_trait]
pub trait TemplateStore: SearchableRepository<FormTemplate> {
    /// Copy a template under `"<name> (Copy)"`
    async fn duplicate(&self, id: i64) -> DomainResult<FormTemplate>;

    async fn list_page(&self, request: &PageRequest) -> DomainResult<Page<FormTemplate>>;
}

/// Response collection
#[async_trait]
pub trait ResponseStore: Repository<FormResponse> {
    /// Merge the given columns into a response, bumping `updatedAt`
    async fn patch(&self, id: i64, patch: &ResponsePatch) -> DomainResult<Option<FormResponse>>;

    async fn list_by_template(&self, template_id: i64) -> DomainResult<Vec<FormResponse>>;

    async fn list_drafts(&self, template_id: i64) -> DomainResult<Vec<FormResponse>>;

    async fn list_page(&self, query: &ResponseQuery) -> DomainResult<Page<FormResponse>>;

    /// Move a response to `submitted` with `submittedAt` set to now
    async fn submit(&self, id: i64) -> DomainResult<Option<FormResponse>>;

    /// Offline-created responses that are submitted or failed
    async fn list_unsynced(&self) -> DomainResult<Vec<FormResponse>>;

    /// Clear `offlineCreated` and stamp `syncedAt`; safe to repeat
    async fn mark_synced(&self, id: i64) -> DomainResult<Option<FormResponse>>;
}
