//! Core data model: stages, records, and schema descriptors.

pub mod record;
pub mod schema;
pub mod stage;

pub use record::{ConfigRecord, Entity, EntityRef, Link};
pub use schema::{diff_schemas, DiffKind, FieldDescriptor, SchemaDescriptor, SchemaDiff};
pub use stage::TransferStage;
