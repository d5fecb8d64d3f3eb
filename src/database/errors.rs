//! # Database Client Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::policy::PolicyError;
use crate::runner::RunnerError;

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("cannot write client defaults file {path}: {source}")]
    DefaultsFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Command(#[from] RunnerError),

    #[error(transparent)]
    Directory(#[from] PolicyError),

    #[error("database '{database}' is not accessible by '{user}' and provisioning needs root")]
    NotProvisionable { database: String, user: String },

    #[error("site '{0}' has no database")]
    NoDatabase(String),
}
