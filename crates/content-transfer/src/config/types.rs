//! Transfer option definitions.

use serde::{Deserialize, Serialize};

use crate::core::TransferStage;
use crate::strategy::{ConflictStrategy, SchemaStrategy, VersionStrategy};

/// Options for one transfer run.
///
/// Strategy fields use `Option<T>` to distinguish "not set" (use the
/// documented default) from an explicit choice. Predicates are registered on
/// the engine builder, not here, so options stay plain data and can round-trip
/// through YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Version compatibility strategy (default: exact).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_strategy: Option<VersionStrategy>,

    /// Schema negotiation strategy (default: strict).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_strategy: Option<SchemaStrategy>,

    /// Conflict handling strategy (default: restore).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_strategy: Option<ConflictStrategy>,

    /// Data groups excluded from the run.
    #[serde(default)]
    pub exclude: Vec<TransferStage>,

    /// If non-empty, only these data groups are transferred.
    #[serde(default)]
    pub only: Vec<TransferStage>,

    /// Minimum delay inserted between consecutive written records, in
    /// milliseconds. Bounds write load on the destination.
    #[serde(default)]
    pub throttle_ms: u64,

    /// Entity types never read from the source. Links touching these types
    /// are dropped.
    #[serde(default)]
    pub ignored_types: Vec<String>,
}

impl TransferOptions {
    /// Whether a data group participates in this run, applying `only` before
    /// `exclude`.
    pub fn stage_enabled(&self, stage: TransferStage) -> bool {
        if !self.only.is_empty() && !self.only.contains(&stage) {
            return false;
        }
        !self.exclude.contains(&stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_stages_enabled_by_default() {
        let options = TransferOptions::default();
        for stage in TransferStage::ALL {
            assert!(options.stage_enabled(stage));
        }
    }

    #[test]
    fn test_exclude_disables_stage() {
        let options = TransferOptions {
            exclude: vec![TransferStage::Links],
            ..Default::default()
        };
        assert!(!options.stage_enabled(TransferStage::Links));
        assert!(options.stage_enabled(TransferStage::Entities));
    }

    #[test]
    fn test_only_gates_all_other_stages() {
        let options = TransferOptions {
            only: vec![TransferStage::Entities, TransferStage::Links],
            ..Default::default()
        };
        assert!(!options.stage_enabled(TransferStage::Schema));
        assert!(!options.stage_enabled(TransferStage::Configuration));
        assert!(options.stage_enabled(TransferStage::Entities));
        assert!(options.stage_enabled(TransferStage::Links));
    }
}
