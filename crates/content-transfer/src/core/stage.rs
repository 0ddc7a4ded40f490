//! Transfer stage enumeration.

use serde::{Deserialize, Serialize};

/// One of the four ordered data groups moved during a run.
///
/// The order is fixed: schemas and configuration are written before entities,
/// and links are written after entities, because a link can only be
/// established once both referenced entities exist at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    Schema,
    Configuration,
    Entities,
    Links,
}

impl TransferStage {
    /// All stages in execution order.
    pub const ALL: [TransferStage; 4] = [
        TransferStage::Schema,
        TransferStage::Configuration,
        TransferStage::Entities,
        TransferStage::Links,
    ];

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Schema => "schema",
            TransferStage::Configuration => "configuration",
            TransferStage::Entities => "entities",
            TransferStage::Links => "links",
        }
    }
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
