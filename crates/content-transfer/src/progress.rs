//! Stage lifecycle progress stream.
//!
//! Every executed stage emits exactly one `Start` event and exactly one
//! terminal event (`Finish`, or `Aborted` when cancellation lands inside the
//! stage), with a `Progress` event per processed record in between. Subscriber
//! faults are isolated the same way as on the diagnostics bus; no events are
//! replayed to late subscribers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::TransferStage;

/// Lifecycle phase of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Start,
    Progress,
    Finish,
    Aborted,
}

/// Per-stage item counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounters {
    /// Items written to the destination.
    pub transferred: u64,
    /// Items dropped by filters or recoverable conflicts.
    pub skipped: u64,
    /// Items that failed to write.
    pub failed: u64,
}

impl StageCounters {
    pub fn total(&self) -> u64 {
        self.transferred + self.skipped + self.failed
    }
}

/// One progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: TransferStage,
    pub phase: ProgressPhase,
    pub counters: StageCounters,
}

type Subscriber = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Multi-subscriber progress channel for one engine.
#[derive(Default)]
pub struct ProgressStream {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ProgressStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. It only sees events published afterwards.
    pub fn subscribe(&self, handler: impl Fn(&ProgressEvent) + Send + Sync + 'static) {
        self.subscribers.lock().unwrap().push(Arc::new(handler));
    }

    /// Publish an event to all subscribers.
    ///
    /// Fan-out runs against a snapshot taken under the lock, so a subscriber
    /// may itself subscribe on this stream.
    pub fn publish(&self, event: ProgressEvent) {
        let subscribers: Vec<Subscriber> = self.subscribers.lock().unwrap().clone();
        for subscriber in &subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(&event))).is_err() {
                warn!(
                    stage = %event.stage,
                    "progress subscriber panicked; event dropped for that subscriber"
                );
            }
        }
    }
}
