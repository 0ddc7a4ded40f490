//! Error types for the transfer engine.

use thiserror::Error;

use crate::core::TransferStage;

/// Which end of the pipeline an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Destination,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Source => write!(f, "source"),
            Endpoint::Destination => write!(f, "destination"),
        }
    }
}

/// Main error type for transfer operations.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Configuration error (invalid YAML, conflicting options, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A strategy option was given a value outside its legal member set.
    #[error("Invalid {field} strategy '{value}' (expected one of: {expected})")]
    InvalidStrategy {
        field: &'static str,
        value: String,
        expected: String,
    },

    /// Endpoint open/close failure. Always fatal.
    #[error("Connection error on {endpoint}: {message}")]
    Connection { endpoint: Endpoint, message: String },

    /// Unresolved schema differences under the strict schema strategy.
    #[error("Schema mismatch: {0} unresolved difference(s) between source and destination")]
    SchemaMismatch(usize),

    /// Source and destination version tags differ under the exact strategy.
    /// Field names avoid `source`, which thiserror reserves for the error
    /// cause chain.
    #[error("Version mismatch: source is '{source_version}', destination is '{destination_version}'")]
    VersionMismatch {
        source_version: String,
        destination_version: String,
    },

    /// A record already exists at the destination. Recoverable unless the
    /// conflict strategy is `bail`.
    #[error("Write conflict in {stage} stage for {item}: {message}")]
    WriteConflict {
        stage: TransferStage,
        item: String,
        message: String,
    },

    /// A provider failed while reading or writing an item.
    #[error("Provider error in {stage} stage: {message}")]
    Provider {
        stage: TransferStage,
        message: String,
    },

    /// The run was cancelled before it produced a summary.
    #[error("Transfer interrupted")]
    Interrupted,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransferError {
    /// Create a Connection error for an endpoint.
    pub fn connection(endpoint: Endpoint, message: impl Into<String>) -> Self {
        TransferError::Connection {
            endpoint,
            message: message.into(),
        }
    }

    /// Create a WriteConflict error for a specific item.
    pub fn write_conflict(
        stage: TransferStage,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TransferError::WriteConflict {
            stage,
            item: item.into(),
            message: message.into(),
        }
    }

    /// Create a Provider error for a stage.
    pub fn provider(stage: TransferStage, message: impl Into<String>) -> Self {
        TransferError::Provider {
            stage,
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = TransferError::connection(Endpoint::Source, "refused");
        assert_eq!(err.to_string(), "Connection error on source: refused");
    }

    #[test]
    fn test_write_conflict_display() {
        let err = TransferError::write_conflict(TransferStage::Entities, "article:7", "exists");
        assert!(err.to_string().contains("entities"));
        assert!(err.to_string().contains("article:7"));
    }

    #[test]
    fn test_version_mismatch_display() {
        let err = TransferError::VersionMismatch {
            source_version: "2".into(),
            destination_version: "1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Version mismatch: source is '2', destination is '1'"
        );
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = TransferError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
    }
}
