//! Destination capability contract.

pub mod memory;

pub use memory::InMemoryDestination;

use async_trait::async_trait;

use crate::core::{ConfigRecord, Entity, Link, SchemaDescriptor};
use crate::error::Result;
use crate::strategy::ConflictStrategy;

/// Writable endpoint over the four data groups.
///
/// Write methods receive the resolved conflict strategy per call; the
/// destination decides how to honor it (overwrite, merge) and returns a
/// [`TransferError::WriteConflict`](crate::TransferError::WriteConflict) when
/// it cannot or will not resolve a collision. An implementation may carry its
/// own protected-type set (types never overwritten during a restore) which it
/// enforces internally.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Open the endpoint. Called once, before any write.
    async fn open(&self) -> Result<()>;

    /// Close the endpoint. Guaranteed to be called on every exit path.
    async fn close(&self) -> Result<()>;

    /// Schema descriptors currently held by this destination.
    async fn schemas(&self) -> Result<Vec<SchemaDescriptor>>;

    /// Version tag of the destination.
    async fn version(&self) -> Result<String>;

    /// Replace the destination's schema set with the given descriptors.
    async fn write_schemas(&self, schemas: &[SchemaDescriptor]) -> Result<()>;

    /// Write one configuration record.
    async fn write_configuration(
        &self,
        record: &ConfigRecord,
        on_conflict: ConflictStrategy,
    ) -> Result<()>;

    /// Write one entity, returning the identifier assigned at the
    /// destination (identity passthrough by default).
    async fn write_entity(&self, entity: &Entity, on_conflict: ConflictStrategy) -> Result<String>;

    /// Write one relation link. Both endpoints must already exist.
    async fn write_link(&self, link: &Link) -> Result<()>;

    /// Short identifier for logs and error messages.
    fn name(&self) -> &str;
}
