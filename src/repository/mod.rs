//! Repository Layer
//!
//! Data access abstractions and implementations.

mod traits;
mod db;
mod query;
mod template_repo;
mod response_repo;


pub use traits::{Repository, ResponseStore, SearchableRepository, TemplateStore};
pub use db::{init_db, DbState};
pub use query::{sort_by_field, Page, PageRequest, ResponseQuery, SortDirection};
pub use template_repo::TemplateRepository;
pub use response_repo::ResponseRepository;
