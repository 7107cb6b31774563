//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! Types are plain serde data; `DomainError` also converts from the
//! store, HTTP and io errors so the outer layers can use `?`.

mod destination;
mod entity;
mod field;
mod response;
mod template;
pub mod timestamp;

pub use destination::{DestinationKind, FormDestination};
pub use entity::{DomainError, DomainResult, Entity, ErrorKind};
pub use field::{
    ChoiceAttrs, ChoiceOption, ConditionOperator, ConditionalRule, DateAttrs, FieldDefinition,
    FieldKind, FieldType, FileAttrs, LocationAttrs, NumberAttrs, SectionAttrs, SignatureAttrs,
    TextAreaAttrs, TextAttrs, ValidationKind, ValidationRule,
};
pub use response::{
    DeviceInfo, FormResponse, LocationData, ResponseData, ResponsePatch, ResponseStatus,
};
pub use template::{FormSettings, FormTemplate};
pub use timestamp::Timestamp;
