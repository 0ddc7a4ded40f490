//! Option validation.

use super::TransferOptions;
use crate::error::{Result, TransferError};

/// Validate the options, failing fast on contradictory settings.
pub fn validate(options: &TransferOptions) -> Result<()> {
    for stage in &options.only {
        if options.exclude.contains(stage) {
            return Err(TransferError::Config(format!(
                "data group '{}' appears in both 'only' and 'exclude'",
                stage
            )));
        }
    }

    for entity_type in &options.ignored_types {
        if entity_type.trim().is_empty() {
            return Err(TransferError::Config(
                "ignored_types entries must be non-empty type identifiers".into(),
            ));
        }
    }

    Ok(())
}
