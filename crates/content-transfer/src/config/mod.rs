//! Transfer option loading and validation.

mod types;
mod validation;

pub use types::TransferOptions;

use std::path::Path;

use crate::error::Result;

impl TransferOptions {
    /// Load options from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse options from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let options: TransferOptions = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "conflict_strategy: bail\nthrottle_ms: 10").unwrap();

        let options = TransferOptions::load(file.path()).unwrap();
        assert_eq!(
            options.conflict_strategy,
            Some(crate::strategy::ConflictStrategy::Bail)
        );
        assert_eq!(options.throttle_ms, 10);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = TransferOptions::load("/nonexistent/options.yaml").unwrap_err();
        assert!(matches!(err, crate::error::TransferError::Io(_)));
    }
}
