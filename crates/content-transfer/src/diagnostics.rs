//! Append-only diagnostics bus.
//!
//! Diagnostics are non-fatal observations about a run (a dropped link, an
//! accepted schema difference, a skipped record), distinct from thrown faults.
//! The bus records every event for the final report and fans it out to
//! subscribers. A subscriber fault is caught and logged at the publish
//! boundary; it never reaches the pipeline. Subscribers registered after an
//! event fires do not receive it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::TransferStage;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One diagnostic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: TransferStage,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl Diagnostic {
    pub fn info(stage: TransferStage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            stage,
            message: message.into(),
            cause: None,
        }
    }

    pub fn warning(stage: TransferStage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            stage,
            message: message.into(),
            cause: None,
        }
    }

    pub fn error(stage: TransferStage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            stage,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

type Subscriber = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

/// Multi-subscriber diagnostics channel for one engine.
///
/// Events are retained for the duration of one run; [`DiagnosticsBus::reset`]
/// clears them at run start.
#[derive(Default)]
pub struct DiagnosticsBus {
    subscribers: Mutex<Vec<Subscriber>>,
    events: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticsBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. It only sees events published afterwards.
    pub fn subscribe(&self, handler: impl Fn(&Diagnostic) + Send + Sync + 'static) {
        self.subscribers.lock().unwrap().push(Arc::new(handler));
    }

    /// Record a diagnostic and notify subscribers.
    pub fn publish(&self, diagnostic: Diagnostic) {
        self.events.lock().unwrap().push(diagnostic.clone());

        // Fan out against a snapshot, with the lock released, so a
        // subscriber may itself publish or subscribe on this bus.
        let subscribers: Vec<Subscriber> = self.subscribers.lock().unwrap().clone();
        for subscriber in &subscribers {
            // Subscriber faults are isolated at the publish boundary.
            if catch_unwind(AssertUnwindSafe(|| subscriber(&diagnostic))).is_err() {
                warn!("diagnostics subscriber panicked; event dropped for that subscriber");
            }
        }
    }

    /// Snapshot of all events recorded since the last reset.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().unwrap().clone()
    }

    /// Clear recorded events at run start. Subscribers stay registered.
    pub fn reset(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_publish_records_and_notifies() {
        let bus = DiagnosticsBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        bus.subscribe(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Diagnostic::info(TransferStage::Entities, "hello"));
        bus.publish(Diagnostic::warning(TransferStage::Links, "dropped"));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(bus.events().len(), 2);
    }

    #[test]
    fn test_late_subscriber_gets_no_replay() {
        let bus = DiagnosticsBus::new();
        bus.publish(Diagnostic::info(TransferStage::Schema, "early"));

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        bus.subscribe(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        bus.publish(Diagnostic::info(TransferStage::Schema, "late"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let bus = DiagnosticsBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();

        bus.subscribe(|_| panic!("observer bug"));
        bus.subscribe(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Diagnostic::error(TransferStage::Entities, "boom"));

        // The event is still recorded and the healthy subscriber still runs.
        assert_eq!(bus.events().len(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscriber_may_publish_reentrantly() {
        let bus = Arc::new(DiagnosticsBus::new());
        let bus_clone = bus.clone();
        bus.subscribe(move |d| {
            // Echo each info event as a warning; the inner publish must not
            // deadlock on the subscriber list.
            if d.severity == Severity::Info {
                bus_clone.publish(Diagnostic::warning(d.stage, "echo"));
            }
        });

        bus.publish(Diagnostic::info(TransferStage::Schema, "original"));

        let events = bus.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].severity, Severity::Warning);
    }

    #[test]
    fn test_reset_clears_events_only() {
        let bus = DiagnosticsBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        bus.subscribe(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Diagnostic::info(TransferStage::Schema, "one"));
        bus.reset();
        assert!(bus.events().is_empty());

        bus.publish(Diagnostic::info(TransferStage::Schema, "two"));
        assert_eq!(bus.events().len(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
