//! Terminal run summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::TransferStage;
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::progress::StageCounters;

/// Summary of one transfer run.
///
/// Stages that never started (for example the links stage after a
/// mid-entities abort) have no entry in `stages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReport {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed or aborted.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Whether the run ended early through cooperative cancellation.
    pub aborted: bool,

    /// True when the run completed without abort and without failed items.
    pub success: bool,

    /// Per-stage item counters, in stage order.
    pub stages: BTreeMap<TransferStage, StageCounters>,

    /// All diagnostics recorded during the run.
    pub diagnostics: Vec<Diagnostic>,
}

impl TransferReport {
    /// Counters for one stage; zero counters if the stage never started.
    pub fn stage(&self, stage: TransferStage) -> StageCounters {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    /// Whether a stage started at all during the run.
    pub fn stage_started(&self, stage: TransferStage) -> bool {
        self.stages.contains_key(&stage)
    }

    /// Total items written across all stages.
    pub fn total_transferred(&self) -> u64 {
        self.stages.values().map(|c| c.transferred).sum()
    }

    /// Convert to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> TransferReport {
        let mut stages = BTreeMap::new();
        stages.insert(
            TransferStage::Entities,
            StageCounters {
                transferred: 4,
                skipped: 1,
                failed: 0,
            },
        );
        TransferReport {
            run_id: "run-1".into(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_seconds: 0.1,
            aborted: false,
            success: true,
            stages,
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_unstarted_stage_reports_zero() {
        let report = report();
        assert!(!report.stage_started(TransferStage::Links));
        assert_eq!(report.stage(TransferStage::Links), StageCounters::default());
        assert_eq!(report.stage(TransferStage::Entities).transferred, 4);
    }

    #[test]
    fn test_to_json_round_trip() {
        let report = report();
        let json = report.to_json().unwrap();
        let back: TransferReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, "run-1");
        assert_eq!(back.total_transferred(), 4);
    }
}
