//! Transfer engine - staged pipeline orchestrator.
//!
//! The engine sequences the four data-group stages (schema, configuration,
//! entities, links), invokes the resolved strategies, applies filter rules,
//! streams progress and diagnostics to observers, and produces a
//! [`TransferReport`].
//!
//! Stages run strictly sequentially: links depend on entities existing at the
//! destination, and entities depend on schema/configuration having been
//! reconciled first. Within a stage, items are processed as a single ordered
//! stream, so a deterministic source gives a deterministic replay.
//!
//! Cancellation is cooperative: the caller passes a
//! [`CancellationToken`] which the engine polls between items, never
//! mid-write. Records already written when cancellation lands are kept.

mod report;

pub use report::TransferReport;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TransferOptions;
use crate::core::{diff_schemas, Entity, EntityRef, Link, SchemaDescriptor, SchemaDiff, TransferStage};
use crate::destination::Destination;
use crate::diagnostics::{Diagnostic, DiagnosticsBus};
use crate::error::{Result, TransferError};
use crate::filter::{is_protected_type, RuleFilterEngine};
use crate::progress::{ProgressEvent, ProgressPhase, ProgressStream, StageCounters};
use crate::source::Source;
use crate::strategy::{ConflictStrategy, SchemaStrategy, Strategies, VersionStrategy};

/// Decision returned by a schema-diff handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaDiffDecision {
    /// Accept the differences and continue; the destination schema will be
    /// overwritten by the source schema.
    Proceed,

    /// Abort the run with a schema mismatch error.
    Abort,
}

/// Handler invoked when the strict schema strategy finds differences.
pub type SchemaDiffHandler = Box<dyn Fn(&[SchemaDiff]) -> SchemaDiffDecision + Send + Sync>;

/// Mutable per-run state threaded through the stages.
#[derive(Default)]
struct RunContext {
    counters: BTreeMap<TransferStage, StageCounters>,
    aborted: bool,
    /// Entities that survived filtering and were written, by source identity.
    /// Links resolve their endpoints against this set.
    transferred: HashSet<EntityRef>,
    /// Whether the entities stage actually ran (vs. excluded by group
    /// filters). When it did not run, link endpoints cannot be checked
    /// against the transferred set and are validated by the destination.
    entities_ran: bool,
    /// Set once the schema and version gates have passed; from then on a
    /// best-effort report is produced even for fatal faults.
    past_gates: bool,
}

/// Staged transfer pipeline between a [`Source`] and a [`Destination`].
pub struct TransferEngine<S: Source, D: Destination> {
    source: S,
    destination: D,
    options: TransferOptions,
    strategies: Strategies,
    filters: RuleFilterEngine,
    diagnostics: Arc<DiagnosticsBus>,
    progress: Arc<ProgressStream>,
    schema_diff_handler: Option<SchemaDiffHandler>,
    last_report: Option<TransferReport>,
}

impl<S: Source, D: Destination> TransferEngine<S, D> {
    /// Create a new engine. Options are validated and strategies resolved
    /// here, so configuration faults surface before any endpoint is opened.
    pub fn new(source: S, destination: D, options: TransferOptions) -> Result<Self> {
        options.validate()?;
        let strategies = Strategies::resolve(&options);

        Ok(Self {
            source,
            destination,
            options,
            strategies,
            filters: RuleFilterEngine::new(),
            diagnostics: Arc::new(DiagnosticsBus::new()),
            progress: Arc::new(ProgressStream::new()),
            schema_diff_handler: None,
            last_report: None,
        })
    }

    /// Register an entity filter rule.
    pub fn with_entity_rule(
        mut self,
        rule: impl Fn(&Entity) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filters.register_entity_rule(rule);
        self
    }

    /// Register a link filter rule.
    pub fn with_link_rule(mut self, rule: impl Fn(&Link) -> bool + Send + Sync + 'static) -> Self {
        self.filters.register_link_rule(rule);
        self
    }

    /// Register a configuration filter rule.
    pub fn with_config_rule(
        mut self,
        rule: impl Fn(&crate::core::ConfigRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filters.register_config_rule(rule);
        self
    }

    /// Register the schema-diff handler consulted under the strict schema
    /// strategy. Without a handler, any difference aborts the run.
    pub fn on_schema_diff(
        mut self,
        handler: impl Fn(&[SchemaDiff]) -> SchemaDiffDecision + Send + Sync + 'static,
    ) -> Self {
        self.schema_diff_handler = Some(Box::new(handler));
        self
    }

    /// Diagnostics bus for this engine.
    pub fn diagnostics(&self) -> &Arc<DiagnosticsBus> {
        &self.diagnostics
    }

    /// Progress stream for this engine.
    pub fn progress(&self) -> &Arc<ProgressStream> {
        &self.progress
    }

    /// The source endpoint.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The destination endpoint.
    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Best-effort summary of the most recent run, also available after a
    /// fatal fault that struck once the schema/version gates had passed.
    pub fn last_report(&self) -> Option<&TransferReport> {
        self.last_report.as_ref()
    }

    /// Run the transfer.
    ///
    /// Cancellation via `cancel` is polled between items and ends the run
    /// early with `aborted == true`; it is not an error. Already-written
    /// records are not rolled back.
    pub async fn transfer(&mut self, cancel: CancellationToken) -> Result<TransferReport> {
        self.diagnostics.reset();
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(run_id = %run_id, source = self.source.name(), destination = self.destination.name(),
            "starting transfer run");

        // Scoped acquisition: both endpoints are closed on every exit path
        // below this point.
        self.source.open().await?;
        if let Err(e) = self.destination.open().await {
            if let Err(close_err) = self.source.close().await {
                warn!("failed to close source after open fault: {}", close_err);
            }
            return Err(e);
        }

        let mut ctx = RunContext::default();
        let outcome = self.run_stages(&cancel, &mut ctx).await;

        let close_source = self.source.close().await;
        let close_destination = self.destination.close().await;

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let failed_items: u64 = ctx.counters.values().map(|c| c.failed).sum();

        let report = TransferReport {
            run_id: run_id.clone(),
            started_at,
            completed_at,
            duration_seconds: duration,
            aborted: ctx.aborted,
            success: outcome.is_ok() && !ctx.aborted && failed_items == 0,
            stages: ctx.counters.clone(),
            diagnostics: self.diagnostics.events(),
        };

        info!(
            run_id = %run_id,
            transferred = report.total_transferred(),
            aborted = report.aborted,
            "transfer run finished in {:.1}s",
            duration
        );

        match outcome {
            Ok(()) => {
                self.last_report = Some(report.clone());
                // Close failures are connection faults even on a clean run.
                close_source?;
                close_destination?;
                Ok(report)
            }
            Err(e) => {
                if let Err(close_err) = close_source.and(close_destination) {
                    warn!("endpoint close failed after fatal fault: {}", close_err);
                }
                if ctx.past_gates {
                    self.last_report = Some(report);
                } else {
                    self.last_report = None;
                }
                Err(e)
            }
        }
    }

    async fn run_stages(&self, cancel: &CancellationToken, ctx: &mut RunContext) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(TransferError::Interrupted);
        }

        let source_schemas = self.schema_stage(ctx).await?;
        ctx.past_gates = true;

        self.configuration_stage(cancel, ctx).await?;
        if ctx.aborted {
            return Ok(());
        }

        self.entities_stage(&source_schemas, cancel, ctx).await?;
        if ctx.aborted {
            return Ok(());
        }

        self.links_stage(cancel, ctx).await
    }

    // ===== Schema stage and gates =====

    async fn schema_stage(&self, ctx: &mut RunContext) -> Result<Vec<SchemaDescriptor>> {
        let stage = TransferStage::Schema;
        self.emit(stage, ProgressPhase::Start, StageCounters::default());
        let mut counters = StageCounters::default();

        // Source schemas are read even when the schema group is excluded:
        // they enumerate the entity types for stage three.
        let source_schemas = match self.source.schemas().await {
            Ok(s) => s,
            Err(e) => {
                self.emit(stage, ProgressPhase::Aborted, counters);
                ctx.counters.insert(stage, counters);
                return Err(e);
            }
        };
        let dest_schemas = match self.destination.schemas().await {
            Ok(s) => s,
            Err(e) => {
                self.emit(stage, ProgressPhase::Aborted, counters);
                ctx.counters.insert(stage, counters);
                return Err(e);
            }
        };

        let mut diffs = diff_schemas(&source_schemas, &dest_schemas);
        if !diffs.is_empty() {
            debug!("found {} schema difference(s)", diffs.len());
            match self.strategies.schema {
                SchemaStrategy::Strict => {
                    let decision = match &self.schema_diff_handler {
                        Some(handler) => handler(&diffs),
                        None => SchemaDiffDecision::Abort,
                    };
                    match decision {
                        SchemaDiffDecision::Abort => {
                            self.emit(stage, ProgressPhase::Aborted, counters);
                            ctx.counters.insert(stage, counters);
                            return Err(TransferError::SchemaMismatch(diffs.len()));
                        }
                        SchemaDiffDecision::Proceed => {
                            // Accepted policy: confirmation clears the diffs
                            // and authorizes overwriting the destination
                            // schema. No reconciliation happens, so the
                            // hazard is surfaced as a warning.
                            self.diagnostics.publish(Diagnostic::warning(
                                stage,
                                format!(
                                    "{} schema difference(s) accepted; destination schema will be overwritten",
                                    diffs.len()
                                ),
                            ));
                            diffs.clear();
                        }
                    }
                }
                SchemaStrategy::Permissive => {
                    self.diagnostics.publish(Diagnostic::info(
                        stage,
                        format!(
                            "proceeding with {} unresolved schema difference(s) (permissive strategy)",
                            diffs.len()
                        ),
                    ));
                }
            }
        }

        // The version gate runs before the destructive schema write, so a
        // version-rejected destination is left untouched.
        if let Err(e) = self.version_gate().await {
            self.emit(stage, ProgressPhase::Aborted, counters);
            ctx.counters.insert(stage, counters);
            return Err(e);
        }

        if self.options.stage_enabled(stage) {
            if let Err(e) = self.destination.write_schemas(&source_schemas).await {
                self.emit(stage, ProgressPhase::Aborted, counters);
                ctx.counters.insert(stage, counters);
                return Err(e);
            }
            counters.transferred = source_schemas.len() as u64;
        } else {
            debug!("schema stage disabled by group filters");
        }

        self.emit(stage, ProgressPhase::Finish, counters);
        ctx.counters.insert(stage, counters);
        Ok(source_schemas)
    }

    async fn version_gate(&self) -> Result<()> {
        match self.strategies.version {
            VersionStrategy::Ignore => {
                debug!("version check skipped (ignore strategy)");
                Ok(())
            }
            VersionStrategy::Exact => {
                let source = self.source.version().await?;
                let destination = self.destination.version().await?;
                if source != destination {
                    return Err(TransferError::VersionMismatch {
                        source_version: source,
                        destination_version: destination,
                    });
                }
                debug!(version = %source, "version tags match");
                Ok(())
            }
        }
    }

    // ===== Record stages =====

    async fn configuration_stage(
        &self,
        cancel: &CancellationToken,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let stage = TransferStage::Configuration;
        self.emit(stage, ProgressPhase::Start, StageCounters::default());
        let mut counters = StageCounters::default();

        if !self.options.stage_enabled(stage) {
            debug!("configuration stage disabled by group filters");
            self.emit(stage, ProgressPhase::Finish, counters);
            ctx.counters.insert(stage, counters);
            return Ok(());
        }

        let mut rx = self.source.stream_configuration();
        let mut first = true;

        while let Some(item) = rx.recv().await {
            if cancel.is_cancelled() {
                ctx.aborted = true;
                break;
            }
            if !first {
                self.throttle_delay().await;
            }
            first = false;

            let record = match item {
                Ok(r) => r,
                Err(e) => {
                    self.emit(stage, ProgressPhase::Aborted, counters);
                    ctx.counters.insert(stage, counters);
                    return Err(e);
                }
            };

            if !self.filters.accepts_config(&record) {
                debug!(key = %record.key, "configuration record dropped by filter");
                counters.skipped += 1;
            } else {
                match self
                    .destination
                    .write_configuration(&record, self.strategies.conflict)
                    .await
                {
                    Ok(()) => counters.transferred += 1,
                    Err(e) => {
                        if let Err(fatal) =
                            self.handle_write_fault(stage, &record.key, e, &mut counters)
                        {
                            self.emit(stage, ProgressPhase::Aborted, counters);
                            ctx.counters.insert(stage, counters);
                            return Err(fatal);
                        }
                    }
                }
            }
            self.emit(stage, ProgressPhase::Progress, counters);
        }

        let phase = if ctx.aborted {
            ProgressPhase::Aborted
        } else {
            ProgressPhase::Finish
        };
        self.emit(stage, phase, counters);
        ctx.counters.insert(stage, counters);
        Ok(())
    }

    async fn entities_stage(
        &self,
        source_schemas: &[SchemaDescriptor],
        cancel: &CancellationToken,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let stage = TransferStage::Entities;
        self.emit(stage, ProgressPhase::Start, StageCounters::default());
        let mut counters = StageCounters::default();

        if !self.options.stage_enabled(stage) {
            debug!("entities stage disabled by group filters");
            self.emit(stage, ProgressPhase::Finish, counters);
            ctx.counters.insert(stage, counters);
            return Ok(());
        }
        ctx.entities_ran = true;

        let mut first = true;

        'types: for schema in source_schemas {
            let entity_type = schema.uid.as_str();
            if is_protected_type(entity_type) {
                debug!(entity_type, "protected type never transferred");
                continue;
            }
            if self.is_ignored_type(entity_type) {
                self.diagnostics.publish(Diagnostic::info(
                    stage,
                    format!("entity type '{}' ignored by configuration", entity_type),
                ));
                continue;
            }

            let mut rx = self.source.stream_entities(entity_type);

            while let Some(item) = rx.recv().await {
                if cancel.is_cancelled() {
                    ctx.aborted = true;
                    break 'types;
                }
                if !first {
                    self.throttle_delay().await;
                }
                first = false;

                let entity = match item {
                    Ok(e) => e,
                    Err(e) => {
                        self.emit(stage, ProgressPhase::Aborted, counters);
                        ctx.counters.insert(stage, counters);
                        return Err(e);
                    }
                };

                if !self.filters.accepts_entity(&entity) {
                    debug!(entity = %entity.entity_ref(), "entity dropped by filter");
                    counters.skipped += 1;
                } else {
                    match self
                        .destination
                        .write_entity(&entity, self.strategies.conflict)
                        .await
                    {
                        Ok(assigned_id) => {
                            counters.transferred += 1;
                            if assigned_id != entity.id {
                                debug!(
                                    entity = %entity.entity_ref(),
                                    assigned_id,
                                    "destination reassigned identifier"
                                );
                            }
                            ctx.transferred.insert(entity.entity_ref());
                        }
                        Err(e) => {
                            let item_name = entity.entity_ref().to_string();
                            if let Err(fatal) =
                                self.handle_write_fault(stage, &item_name, e, &mut counters)
                            {
                                self.emit(stage, ProgressPhase::Aborted, counters);
                                ctx.counters.insert(stage, counters);
                                return Err(fatal);
                            }
                        }
                    }
                }
                self.emit(stage, ProgressPhase::Progress, counters);
            }
        }

        let phase = if ctx.aborted {
            ProgressPhase::Aborted
        } else {
            ProgressPhase::Finish
        };
        self.emit(stage, phase, counters);
        ctx.counters.insert(stage, counters);
        Ok(())
    }

    async fn links_stage(&self, cancel: &CancellationToken, ctx: &mut RunContext) -> Result<()> {
        let stage = TransferStage::Links;
        self.emit(stage, ProgressPhase::Start, StageCounters::default());
        let mut counters = StageCounters::default();

        if !self.options.stage_enabled(stage) {
            debug!("links stage disabled by group filters");
            self.emit(stage, ProgressPhase::Finish, counters);
            ctx.counters.insert(stage, counters);
            return Ok(());
        }

        let mut rx = self.source.stream_links();
        let mut first = true;

        while let Some(item) = rx.recv().await {
            if cancel.is_cancelled() {
                ctx.aborted = true;
                break;
            }
            if !first {
                self.throttle_delay().await;
            }
            first = false;

            let link = match item {
                Ok(l) => l,
                Err(e) => {
                    self.emit(stage, ProgressPhase::Aborted, counters);
                    ctx.counters.insert(stage, counters);
                    return Err(e);
                }
            };

            if let Some(reason) = self.link_drop_reason(&link, ctx) {
                counters.skipped += 1;
                self.diagnostics.publish(Diagnostic::info(
                    stage,
                    format!("link {} dropped: {}", link, reason),
                ));
            } else if !self.filters.accepts_link(&link) {
                debug!(link = %link, "link dropped by filter");
                counters.skipped += 1;
            } else {
                match self.destination.write_link(&link).await {
                    Ok(()) => counters.transferred += 1,
                    Err(e) => {
                        let item_name = link.to_string();
                        if let Err(fatal) =
                            self.handle_write_fault(stage, &item_name, e, &mut counters)
                        {
                            self.emit(stage, ProgressPhase::Aborted, counters);
                            ctx.counters.insert(stage, counters);
                            return Err(fatal);
                        }
                    }
                }
            }
            self.emit(stage, ProgressPhase::Progress, counters);
        }

        let phase = if ctx.aborted {
            ProgressPhase::Aborted
        } else {
            ProgressPhase::Finish
        };
        self.emit(stage, phase, counters);
        ctx.counters.insert(stage, counters);
        Ok(())
    }

    // ===== Helpers =====

    /// A link is dropped (never orphaned) when an endpoint type is ignored or
    /// when an endpoint entity did not survive the entities stage. When the
    /// entities stage was excluded from the run, endpoint existence is left
    /// to the destination to validate.
    fn link_drop_reason(&self, link: &Link, ctx: &RunContext) -> Option<&'static str> {
        let endpoints = [&link.left, &link.right];
        if endpoints
            .iter()
            .any(|e| self.is_ignored_type(&e.entity_type))
        {
            return Some("endpoint type is ignored");
        }
        if ctx.entities_ran && endpoints.iter().any(|e| !ctx.transferred.contains(e)) {
            return Some("endpoint entity was not transferred");
        }
        None
    }

    fn is_ignored_type(&self, entity_type: &str) -> bool {
        self.options
            .ignored_types
            .iter()
            .any(|t| t == entity_type)
    }

    /// Per-record write fault policy: conflicts are recoverable skips unless
    /// the conflict strategy is `bail`; connection faults are always fatal;
    /// anything else is counted as a failed item and recorded as a
    /// diagnostic.
    fn handle_write_fault(
        &self,
        stage: TransferStage,
        item: &str,
        err: TransferError,
        counters: &mut StageCounters,
    ) -> Result<()> {
        match err {
            TransferError::WriteConflict { .. }
                if self.strategies.conflict == ConflictStrategy::Bail =>
            {
                Err(err)
            }
            TransferError::WriteConflict { .. } => {
                counters.skipped += 1;
                self.diagnostics.publish(
                    Diagnostic::warning(stage, format!("conflict on {}, skipped", item))
                        .with_cause(err),
                );
                Ok(())
            }
            TransferError::Connection { .. } => Err(err),
            other => {
                counters.failed += 1;
                warn!(stage = %stage, item, "write failed: {}", other);
                self.diagnostics.publish(
                    Diagnostic::error(stage, format!("failed to write {}", item)).with_cause(other),
                );
                Ok(())
            }
        }
    }

    async fn throttle_delay(&self) {
        if self.options.throttle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.options.throttle_ms)).await;
        }
    }

    fn emit(&self, stage: TransferStage, phase: ProgressPhase, counters: StageCounters) {
        self.progress.publish(ProgressEvent {
            stage,
            phase,
            counters,
        });
    }
}
