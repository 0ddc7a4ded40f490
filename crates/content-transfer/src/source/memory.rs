//! In-memory source provider.
//!
//! Reference implementation of the [`Source`] contract, used as a test double
//! and for round-trip checks against an [`InMemoryDestination`]. Streams are
//! fed from cloned snapshots by a spawned task, so they behave like any other
//! finite single-pass provider stream.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Source, STREAM_BUFFER};
use crate::core::{ConfigRecord, Entity, Link, SchemaDescriptor, TransferStage};
use crate::error::{Endpoint, Result, TransferError};

/// Source backed by in-memory collections.
pub struct InMemorySource {
    version: String,
    schemas: Vec<SchemaDescriptor>,
    configuration: Vec<ConfigRecord>,
    entities: Vec<Entity>,
    links: Vec<Link>,
    open: AtomicBool,
    fail_open: bool,
}

impl InMemorySource {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            schemas: Vec::new(),
            configuration: Vec::new(),
            entities: Vec::new(),
            links: Vec::new(),
            open: AtomicBool::new(false),
            fail_open: false,
        }
    }

    pub fn with_schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn with_configuration(mut self, record: ConfigRecord) -> Self {
        self.configuration.push(record);
        self
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Make `open()` fail, for connection-fault tests.
    pub fn with_failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    fn ensure_open(&self, stage: TransferStage) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransferError::provider(stage, "source is not open"))
        }
    }

    fn stream_items<T: Send + 'static>(
        &self,
        stage: TransferStage,
        items: Vec<T>,
    ) -> mpsc::Receiver<Result<T>> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let open_check = self.ensure_open(stage);
        tokio::spawn(async move {
            if let Err(e) = open_check {
                let _ = tx.send(Err(e)).await;
                return;
            }
            for item in items {
                if tx.send(Ok(item)).await.is_err() {
                    break;
                }
            }
        });
        rx
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn open(&self) -> Result<()> {
        if self.fail_open {
            return Err(TransferError::connection(
                Endpoint::Source,
                "simulated open failure",
            ));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn schemas(&self) -> Result<Vec<SchemaDescriptor>> {
        self.ensure_open(TransferStage::Schema)?;
        Ok(self.schemas.clone())
    }

    async fn version(&self) -> Result<String> {
        Ok(self.version.clone())
    }

    fn stream_configuration(&self) -> mpsc::Receiver<Result<ConfigRecord>> {
        self.stream_items(TransferStage::Configuration, self.configuration.clone())
    }

    fn stream_entities(&self, entity_type: &str) -> mpsc::Receiver<Result<Entity>> {
        let items: Vec<Entity> = self
            .entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect();
        self.stream_items(TransferStage::Entities, items)
    }

    fn stream_links(&self) -> mpsc::Receiver<Result<Link>> {
        self.stream_items(TransferStage::Links, self.links.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_streams_preserve_emission_order() {
        let source = InMemorySource::new("1")
            .with_entity(Entity::new("api::article", "1"))
            .with_entity(Entity::new("api::article", "2"))
            .with_entity(Entity::new("api::author", "1"));
        source.open().await.unwrap();

        let mut rx = source.stream_entities("api::article");
        let mut ids = Vec::new();
        while let Some(item) = rx.recv().await {
            ids.push(item.unwrap().id);
        }
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_stream_before_open_yields_error() {
        let source = InMemorySource::new("1").with_entity(Entity::new("api::article", "1"));
        let mut rx = source.stream_entities("api::article");
        let first = rx.recv().await.unwrap();
        assert!(first.is_err());
    }

    #[tokio::test]
    async fn test_failing_open() {
        let source = InMemorySource::new("1").with_failing_open();
        let err = source.open().await.unwrap_err();
        assert!(matches!(err, TransferError::Connection { .. }));
    }
}
