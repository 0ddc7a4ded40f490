//! # content-transfer
//!
//! Engine for moving structured content between a source and a destination
//! endpoint.
//!
//! A transfer runs as a fixed sequence of stages over four data groups:
//!
//! - **Schema** descriptors, diffed and negotiated before any data moves
//! - **Configuration** key/value records
//! - **Entities**, streamed per content type
//! - **Relation links**, written only after both endpoint entities exist
//!
//! Behavior is controlled by three strategies (version, schema, conflict),
//! rule-based filters, and transfer options. Observers attach to a
//! diagnostics bus and a progress stream; cancellation is cooperative via a
//! `CancellationToken` and keeps whatever was already written.
//!
//! ## Example
//!
//! ```rust,no_run
//! use content_transfer::{
//!     InMemoryDestination, InMemorySource, TransferEngine, TransferOptions,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> content_transfer::Result<()> {
//!     let source = InMemorySource::new("4.15.0");
//!     let destination = InMemoryDestination::new("4.15.0");
//!
//!     let mut engine = TransferEngine::new(source, destination, TransferOptions::default())?;
//!     let report = engine.transfer(CancellationToken::new()).await?;
//!     println!("transferred {} item(s)", report.total_transferred());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod destination;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod filter;
pub mod progress;
pub mod source;
pub mod strategy;

// Re-exports for convenient access
pub use config::TransferOptions;
pub use crate::core::{
    ConfigRecord, DiffKind, Entity, EntityRef, FieldDescriptor, Link, SchemaDescriptor,
    SchemaDiff, TransferStage,
};
pub use destination::{Destination, InMemoryDestination};
pub use diagnostics::{Diagnostic, DiagnosticsBus, Severity};
pub use engine::{SchemaDiffDecision, SchemaDiffHandler, TransferEngine, TransferReport};
pub use error::{Endpoint, Result, TransferError};
pub use filter::RuleFilterEngine;
pub use progress::{ProgressEvent, ProgressPhase, ProgressStream, StageCounters};
pub use source::{InMemorySource, Source};
pub use strategy::{ConflictStrategy, SchemaStrategy, Strategies, VersionStrategy};
