//! # Archive Policy Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for tag and directory resolution
pub type PolicyResult<T> = Result<T, PolicyError>;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid archive tag '{0}': must be non-empty without whitespace")]
    InvalidTag(String),

    #[error("directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("cannot create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}
