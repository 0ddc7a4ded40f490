//! In-memory destination provider.
//!
//! Reference implementation of the [`Destination`] contract. Besides serving
//! as a test double it validates the ordering law: a link write fails if
//! either endpoint entity is absent.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::Destination;
use crate::core::{ConfigRecord, Entity, Link, SchemaDescriptor, TransferStage};
use crate::error::{Endpoint, Result, TransferError};
use crate::source::InMemorySource;
use crate::strategy::ConflictStrategy;

#[derive(Default)]
struct Store {
    schemas: Vec<SchemaDescriptor>,
    configuration: BTreeMap<String, Value>,
    entities: HashMap<String, BTreeMap<String, Entity>>,
    links: Vec<Link>,
}

/// Destination backed by in-memory collections.
pub struct InMemoryDestination {
    version: String,
    store: Mutex<Store>,
    /// Types never overwritten during a restore, enforced internally.
    restore_exclude: HashSet<String>,
    open: AtomicBool,
    fail_open: bool,
}

impl InMemoryDestination {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            store: Mutex::new(Store::default()),
            restore_exclude: HashSet::new(),
            open: AtomicBool::new(false),
            fail_open: false,
        }
    }

    /// Seed an existing schema, for diff tests.
    pub fn with_schema(self, schema: SchemaDescriptor) -> Self {
        self.store.lock().unwrap().schemas.push(schema);
        self
    }

    /// Seed an existing entity, for conflict tests.
    pub fn with_entity(self, entity: Entity) -> Self {
        self.store
            .lock()
            .unwrap()
            .entities
            .entry(entity.entity_type.clone())
            .or_default()
            .insert(entity.id.clone(), entity);
        self
    }

    /// Entity types protected from overwrite during a restore.
    pub fn with_restore_exclude(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.restore_exclude.extend(types);
        self
    }

    /// Make `open()` fail, for connection-fault tests.
    pub fn with_failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    // ===== Test/inspection accessors =====

    pub fn entity_count(&self, entity_type: &str) -> usize {
        self.store
            .lock()
            .unwrap()
            .entities
            .get(entity_type)
            .map_or(0, |m| m.len())
    }

    pub fn entity(&self, entity_type: &str, id: &str) -> Option<Entity> {
        self.store
            .lock()
            .unwrap()
            .entities
            .get(entity_type)
            .and_then(|m| m.get(id).cloned())
    }

    pub fn links(&self) -> Vec<Link> {
        self.store.lock().unwrap().links.clone()
    }

    pub fn configuration(&self) -> Vec<ConfigRecord> {
        self.store
            .lock()
            .unwrap()
            .configuration
            .iter()
            .map(|(k, v)| ConfigRecord::new(k.clone(), v.clone()))
            .collect()
    }

    pub fn stored_schemas(&self) -> Vec<SchemaDescriptor> {
        self.store.lock().unwrap().schemas.clone()
    }

    /// Re-export the stored dataset as a source, for round-trip checks.
    pub fn to_source(&self) -> InMemorySource {
        let store = self.store.lock().unwrap();
        let mut source = InMemorySource::new(self.version.clone());
        for schema in &store.schemas {
            source = source.with_schema(schema.clone());
        }
        for (key, value) in &store.configuration {
            source = source.with_configuration(ConfigRecord::new(key.clone(), value.clone()));
        }
        for by_id in store.entities.values() {
            for entity in by_id.values() {
                source = source.with_entity(entity.clone());
            }
        }
        for link in &store.links {
            source = source.with_link(link.clone());
        }
        source
    }

    fn ensure_open(&self, stage: TransferStage) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransferError::provider(stage, "destination is not open"))
        }
    }
}

#[async_trait]
impl Destination for InMemoryDestination {
    async fn open(&self) -> Result<()> {
        if self.fail_open {
            return Err(TransferError::connection(
                Endpoint::Destination,
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
        Ok(self.store.lock().unwrap().schemas.clone())
    }

    async fn version(&self) -> Result<String> {
        Ok(self.version.clone())
    }

    async fn write_schemas(&self, schemas: &[SchemaDescriptor]) -> Result<()> {
        self.ensure_open(TransferStage::Schema)?;
        self.store.lock().unwrap().schemas = schemas.to_vec();
        Ok(())
    }

    async fn write_configuration(
        &self,
        record: &ConfigRecord,
        on_conflict: ConflictStrategy,
    ) -> Result<()> {
        self.ensure_open(TransferStage::Configuration)?;
        let mut store = self.store.lock().unwrap();
        if store.configuration.contains_key(&record.key) && on_conflict == ConflictStrategy::Bail {
            return Err(TransferError::write_conflict(
                TransferStage::Configuration,
                record.key.clone(),
                "configuration key already exists",
            ));
        }
        store
            .configuration
            .insert(record.key.clone(), record.value.clone());
        Ok(())
    }

    async fn write_entity(&self, entity: &Entity, on_conflict: ConflictStrategy) -> Result<String> {
        self.ensure_open(TransferStage::Entities)?;
        let mut store = self.store.lock().unwrap();
        let by_id = store.entities.entry(entity.entity_type.clone()).or_default();

        match by_id.get_mut(&entity.id) {
            None => {
                by_id.insert(entity.id.clone(), entity.clone());
            }
            Some(existing) => match on_conflict {
                ConflictStrategy::Bail => {
                    return Err(TransferError::write_conflict(
                        TransferStage::Entities,
                        entity.entity_ref().to_string(),
                        "entity already exists",
                    ));
                }
                ConflictStrategy::Restore => {
                    if self.restore_exclude.contains(&entity.entity_type) {
                        return Err(TransferError::write_conflict(
                            TransferStage::Entities,
                            entity.entity_ref().to_string(),
                            "type is protected from restore overwrite",
                        ));
                    }
                    *existing = entity.clone();
                }
                ConflictStrategy::Merge => {
                    existing
                        .attributes
                        .extend(entity.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            },
        }

        // Identity passthrough: the assigned id is the source id.
        Ok(entity.id.clone())
    }

    async fn write_link(&self, link: &Link) -> Result<()> {
        self.ensure_open(TransferStage::Links)?;
        let mut store = self.store.lock().unwrap();

        for endpoint in [&link.left, &link.right] {
            let exists = store
                .entities
                .get(&endpoint.entity_type)
                .is_some_and(|m| m.contains_key(&endpoint.id));
            if !exists {
                return Err(TransferError::provider(
                    TransferStage::Links,
                    format!("link endpoint {} does not exist", endpoint),
                ));
            }
        }

        store.links.push(link.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityRef;
    use serde_json::json;

    #[tokio::test]
    async fn test_restore_overwrites_existing_entity() {
        let dest = InMemoryDestination::new("1")
            .with_entity(Entity::new("api::article", "1").with_attribute("title", json!("old")));
        dest.open().await.unwrap();

        let incoming = Entity::new("api::article", "1").with_attribute("title", json!("new"));
        let id = dest
            .write_entity(&incoming, ConflictStrategy::Restore)
            .await
            .unwrap();
        assert_eq!(id, "1");
        assert_eq!(
            dest.entity("api::article", "1").unwrap().attributes["title"],
            json!("new")
        );
    }

    #[tokio::test]
    async fn test_merge_keeps_unrelated_attributes() {
        let dest = InMemoryDestination::new("1").with_entity(
            Entity::new("api::article", "1")
                .with_attribute("title", json!("old"))
                .with_attribute("views", json!(7)),
        );
        dest.open().await.unwrap();

        let incoming = Entity::new("api::article", "1").with_attribute("title", json!("new"));
        dest.write_entity(&incoming, ConflictStrategy::Merge)
            .await
            .unwrap();

        let merged = dest.entity("api::article", "1").unwrap();
        assert_eq!(merged.attributes["title"], json!("new"));
        assert_eq!(merged.attributes["views"], json!(7));
    }

    #[tokio::test]
    async fn test_bail_surfaces_write_conflict() {
        let dest = InMemoryDestination::new("1").with_entity(Entity::new("api::article", "1"));
        dest.open().await.unwrap();

        let err = dest
            .write_entity(&Entity::new("api::article", "1"), ConflictStrategy::Bail)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::WriteConflict { .. }));
    }

    #[tokio::test]
    async fn test_restore_exclude_protects_type() {
        let dest = InMemoryDestination::new("1")
            .with_entity(Entity::new("plugin::upload.file", "1"))
            .with_restore_exclude(["plugin::upload.file".to_string()]);
        dest.open().await.unwrap();

        let err = dest
            .write_entity(
                &Entity::new("plugin::upload.file", "1"),
                ConflictStrategy::Restore,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::WriteConflict { .. }));
    }

    #[tokio::test]
    async fn test_link_requires_both_endpoints() {
        let dest = InMemoryDestination::new("1").with_entity(Entity::new("api::article", "1"));
        dest.open().await.unwrap();

        let dangling = Link::new(
            EntityRef::new("api::article", "1"),
            EntityRef::new("api::author", "404"),
            "manyToOne",
        );
        assert!(dest.write_link(&dangling).await.is_err());
        assert!(dest.links().is_empty());
    }
}
