//! # Site Registry Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Site table load and lookup errors
///
/// Every load-time variant is a configuration error: fatal at startup,
/// never retried.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read site table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no header line in site table")]
    MissingHeader,

    #[error("no website rows in site table")]
    NoSites,

    #[error("duplicate columns in header: {}", .0.join(", "))]
    DuplicateColumns(Vec<String>),

    #[error("missing columns in header: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("unknown columns in header: {}", .0.join(", "))]
    UnknownColumns(Vec<String>),

    #[error("line {line}: too few fields (expected {expected}, found {found})")]
    TooFewFields {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("duplicate siteName values: {}", .0.join(", "))]
    DuplicateSites(Vec<String>),

    #[error("site '{0}' is not present in the site table")]
    UnknownSite(String),

    #[error("row {row} out of range (table has {len} sites)")]
    RowOutOfRange { row: usize, len: usize },
}

impl RegistryError {
    /// True for errors detected while loading the table
    pub fn is_config_error(&self) -> bool {
        !matches!(
            self,
            RegistryError::UnknownSite(_) | RegistryError::RowOutOfRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_columns() {
        let err = RegistryError::MissingColumns(vec!["host".into(), "dbName".into()]);
        assert_eq!(err.to_string(), "missing columns in header: host, dbName");
    }

    #[test]
    fn test_lookup_errors_are_not_config_errors() {
        assert!(!RegistryError::UnknownSite("x".into()).is_config_error());
        assert!(RegistryError::NoSites.is_config_error());
    }
}
