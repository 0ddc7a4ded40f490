//! Schema descriptors and structural diffing.
//!
//! A [`SchemaDescriptor`] is a versioned structural description of one content
//! type. [`diff_schemas`] compares the source and destination descriptor sets
//! for every shared type and reports field-level differences, which the engine
//! feeds into the strict/permissive schema negotiation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structural description of one field of a content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field kind (e.g. "string", "integer", "relation", "media").
    pub field_type: String,

    /// Whether the field is required.
    #[serde(default)]
    pub required: bool,

    /// Whether values must be unique within the type.
    #[serde(default)]
    pub unique: bool,

    /// Related content type, for relation fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl FieldDescriptor {
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            required: false,
            unique: false,
            target: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn relation(target: impl Into<String>) -> Self {
        Self {
            field_type: "relation".to_string(),
            required: false,
            unique: false,
            target: Some(target.into()),
        }
    }
}

/// Versioned structural description of one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Content type identifier (e.g. "api::article").
    pub uid: String,

    /// Schema version tag.
    pub version: String,

    /// Field descriptors keyed by field name. BTreeMap keeps diff output
    /// deterministic.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDescriptor>,
}

impl SchemaDescriptor {
    pub fn new(uid: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            version: version.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), field);
        self
    }
}

/// Kind of structural difference found at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

/// One structural difference between source and destination schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Dotted path to the differing element (e.g. "api::article.title").
    pub path: String,

    /// Whether the element was added, removed, or changed relative to the
    /// destination.
    pub kind: DiffKind,

    /// Value on the source side, if present.
    pub source_value: Option<Value>,

    /// Value on the destination side, if present.
    pub dest_value: Option<Value>,
}

/// Compare source and destination schema sets for every shared type.
///
/// Types present on only one side are not reported: a brand-new type at the
/// source is created by the schema stage and an extra destination type is left
/// untouched. Only shared types can silently lose data on overwrite, so those
/// are the ones the negotiation must surface.
pub fn diff_schemas(source: &[SchemaDescriptor], destination: &[SchemaDescriptor]) -> Vec<SchemaDiff> {
    let dest_by_uid: BTreeMap<&str, &SchemaDescriptor> =
        destination.iter().map(|s| (s.uid.as_str(), s)).collect();

    let mut diffs = Vec::new();

    for src in source {
        let Some(dst) = dest_by_uid.get(src.uid.as_str()) else {
            continue;
        };

        for (name, src_field) in &src.fields {
            let path = format!("{}.{}", src.uid, name);
            match dst.fields.get(name) {
                None => diffs.push(SchemaDiff {
                    path,
                    kind: DiffKind::Added,
                    source_value: to_value(src_field),
                    dest_value: None,
                }),
                Some(dst_field) if dst_field != src_field => diffs.push(SchemaDiff {
                    path,
                    kind: DiffKind::Changed,
                    source_value: to_value(src_field),
                    dest_value: to_value(dst_field),
                }),
                Some(_) => {}
            }
        }

        for (name, dst_field) in &dst.fields {
            if !src.fields.contains_key(name) {
                diffs.push(SchemaDiff {
                    path: format!("{}.{}", src.uid, name),
                    kind: DiffKind::Removed,
                    source_value: None,
                    dest_value: to_value(dst_field),
                });
            }
        }
    }

    diffs
}

fn to_value(field: &FieldDescriptor) -> Option<Value> {
    serde_json::to_value(field).ok()
}
