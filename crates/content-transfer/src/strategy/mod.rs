//! Strategy enumerations and resolution.
//!
//! Three enumerated policies control a run: version compatibility, schema
//! negotiation, and per-record conflict handling. [`Strategies::resolve`]
//! substitutes the documented defaults for any option left unset, and string
//! parsing fails fast with [`TransferError::InvalidStrategy`] so callers never
//! discover a typo mid-run.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::TransferOptions;
use crate::error::TransferError;

/// Version compatibility policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStrategy {
    /// Source and destination version tags must be equal.
    #[default]
    Exact,

    /// Skip the version check entirely.
    Ignore,
}

impl VersionStrategy {
    /// The full legal member set, for callers that enumerate options.
    pub const ALL: [VersionStrategy; 2] = [VersionStrategy::Exact, VersionStrategy::Ignore];

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStrategy::Exact => "exact",
            VersionStrategy::Ignore => "ignore",
        }
    }
}

/// Schema negotiation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaStrategy {
    /// Any schema difference must be resolved by a registered diff handler,
    /// otherwise the run aborts.
    #[default]
    Strict,

    /// Proceed regardless of schema differences.
    Permissive,
}

impl SchemaStrategy {
    pub const ALL: [SchemaStrategy; 2] = [SchemaStrategy::Strict, SchemaStrategy::Permissive];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaStrategy::Strict => "strict",
            SchemaStrategy::Permissive => "permissive",
        }
    }
}

/// Per-record conflict policy applied when a written record already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Overwrite the existing record with the source copy.
    #[default]
    Restore,

    /// Merge source attributes over the existing record.
    Merge,

    /// Treat any collision as fatal and abort the run.
    Bail,
}

impl ConflictStrategy {
    pub const ALL: [ConflictStrategy; 3] = [
        ConflictStrategy::Restore,
        ConflictStrategy::Merge,
        ConflictStrategy::Bail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Restore => "restore",
            ConflictStrategy::Merge => "merge",
            ConflictStrategy::Bail => "bail",
        }
    }
}

macro_rules! strategy_from_str {
    ($ty:ident, $field:literal) => {
        impl FromStr for $ty {
            type Err = TransferError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| TransferError::InvalidStrategy {
                        field: $field,
                        value: s.to_string(),
                        expected: $ty::ALL.map(|v| v.as_str()).join(", "),
                    })
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

strategy_from_str!(VersionStrategy, "version");
strategy_from_str!(SchemaStrategy, "schema");
strategy_from_str!(ConflictStrategy, "conflict");

/// Resolved strategy set for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strategies {
    pub version: VersionStrategy,
    pub schema: SchemaStrategy,
    pub conflict: ConflictStrategy,
}

impl Strategies {
    /// Resolve strategies from options, substituting defaults for unset
    /// fields: `exact` / `strict` / `restore`.
    pub fn resolve(options: &TransferOptions) -> Self {
        Self {
            version: options.version_strategy.unwrap_or_default(),
            schema: options.schema_strategy.unwrap_or_default(),
            conflict: options.conflict_strategy.unwrap_or_default(),
        }
    }

    /// Parse strategies from string-typed inputs, substituting defaults for
    /// `None` and rejecting unrecognized values.
    pub fn parse(
        version: Option<&str>,
        schema: Option<&str>,
        conflict: Option<&str>,
    ) -> crate::error::Result<Self> {
        Ok(Self {
            version: version.map(str::parse).transpose()?.unwrap_or_default(),
            schema: schema.map(str::parse).transpose()?.unwrap_or_default(),
            conflict: conflict.map(str::parse).transpose()?.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let resolved = Strategies::resolve(&TransferOptions::default());
        assert_eq!(resolved.version, VersionStrategy::Exact);
        assert_eq!(resolved.schema, SchemaStrategy::Strict);
        assert_eq!(resolved.conflict, ConflictStrategy::Restore);
    }

    #[test]
    fn test_parse_valid_values() {
        let resolved = Strategies::parse(Some("ignore"), Some("permissive"), Some("merge")).unwrap();
        assert_eq!(resolved.version, VersionStrategy::Ignore);
        assert_eq!(resolved.schema, SchemaStrategy::Permissive);
        assert_eq!(resolved.conflict, ConflictStrategy::Merge);
    }

    #[test]
    fn test_parse_rejects_unknown_value() {
        let err = Strategies::parse(Some("fuzzy"), None, None).unwrap_err();
        match err {
            TransferError::InvalidStrategy { field, value, expected } => {
                assert_eq!(field, "version");
                assert_eq!(value, "fuzzy");
                assert!(expected.contains("exact"));
                assert!(expected.contains("ignore"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_member_sets_are_enumerable() {
        assert_eq!(VersionStrategy::ALL.len(), 2);
        assert_eq!(SchemaStrategy::ALL.len(), 2);
        assert_eq!(ConflictStrategy::ALL.len(), 3);
    }

    #[test]
    fn test_serde_uses_snake_case_names() {
        let json = serde_json::to_string(&ConflictStrategy::Bail).unwrap();
        assert_eq!(json, "\"bail\"");
    }
}
