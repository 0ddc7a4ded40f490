//! Record types crossing the source/destination boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A type-scoped reference to an entity.
///
/// Identity is scoped to the entity type: two entities with the same id but
/// different types are unrelated records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Content type identifier (e.g. "api::article").
    pub entity_type: String,

    /// Opaque identifier within the type.
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

/// A single entity record produced by a source and consumed by a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Content type identifier.
    pub entity_type: String,

    /// Opaque identifier, unique within the type.
    pub id: String,

    /// Attribute values keyed by attribute name.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter, mostly for tests and fixtures.
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// The type-scoped reference for this entity.
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.id.clone())
    }
}

/// A relation edge between two entities.
///
/// Links are only written after both referenced entities exist at the
/// destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Owning side of the relation.
    pub left: EntityRef,

    /// Related side of the relation.
    pub right: EntityRef,

    /// Relation kind (e.g. "oneToMany", "manyToMany").
    pub kind: String,
}

impl Link {
    pub fn new(left: EntityRef, right: EntityRef, kind: impl Into<String>) -> Self {
        Self {
            left,
            right,
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} ({})", self.left, self.right, self.kind)
    }
}

/// A configuration record (key/value document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Configuration key (e.g. "core-store::i18n-locales").
    pub key: String,

    /// Arbitrary JSON payload.
    pub value: Value,
}

impl ConfigRecord {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_ref_display() {
        let r = EntityRef::new("api::article", "42");
        assert_eq!(r.to_string(), "api::article:42");
    }

    #[test]
    fn test_entity_ref_is_type_scoped() {
        let a = EntityRef::new("api::article", "1");
        let b = EntityRef::new("api::author", "1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_entity_attributes_round_trip() {
        let entity = Entity::new("api::article", "1")
            .with_attribute("title", json!("Hello"))
            .with_attribute("views", json!(12));

        let json = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entity);
        assert_eq!(back.attributes["title"], json!("Hello"));
    }

    #[test]
    fn test_link_display() {
        let link = Link::new(
            EntityRef::new("api::article", "1"),
            EntityRef::new("api::author", "3"),
            "manyToOne",
        );
        assert_eq!(link.to_string(), "api::article:1 -> api::author:3 (manyToOne)");
    }
}
