//! # Settings Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for settings operations
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Settings load errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("settings have no [{0}] table")]
    MissingSection(&'static str),

    #[error("missing parameters: {}", .0.join(" "))]
    MissingKeys(Vec<&'static str>),

    #[error("parameter '{key}' must be \"true\" or \"false\", found '{value}'")]
    InvalidBoolean { key: &'static str, value: String },

    #[error("parameter 'dirmode' must be an octal mode, found '{0}'")]
    InvalidDirMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_listed_together() {
        let err = SettingsError::MissingKeys(vec!["scp", "logdir"]);
        assert_eq!(err.to_string(), "missing parameters: scp logdir");
    }
}
