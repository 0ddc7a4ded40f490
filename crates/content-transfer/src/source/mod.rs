//! Source capability contract.

pub mod memory;

pub use memory::InMemorySource;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::{ConfigRecord, Entity, Link, SchemaDescriptor};
use crate::error::Result;

/// Buffer size for provider item streams.
pub(crate) const STREAM_BUFFER: usize = 64;

/// Readable endpoint over the four data groups.
///
/// # Streaming
///
/// The `stream_*` methods return channel receivers that yield items until the
/// group is exhausted, enabling backpressure for large datasets. Streams are
/// finite and single-pass: restarting one requires re-opening the source.
/// Emission order is preserved through the pipeline, so a deterministic
/// source gives a deterministic replay.
#[async_trait]
pub trait Source: Send + Sync {
    /// Open the endpoint. Called once, before any read.
    async fn open(&self) -> Result<()>;

    /// Close the endpoint. Guaranteed to be called on every exit path.
    async fn close(&self) -> Result<()>;

    /// Schema descriptors for every content type held by this source.
    async fn schemas(&self) -> Result<Vec<SchemaDescriptor>>;

    /// Version tag of the dataset.
    async fn version(&self) -> Result<String>;

    /// Stream configuration records.
    fn stream_configuration(&self) -> mpsc::Receiver<Result<ConfigRecord>>;

    /// Stream all entities of one content type.
    fn stream_entities(&self, entity_type: &str) -> mpsc::Receiver<Result<Entity>>;

    /// Stream all relation links.
    fn stream_links(&self) -> mpsc::Receiver<Result<Link>>;

    /// Short identifier for logs and error messages (e.g. "file", "memory").
    fn name(&self) -> &str;
}
