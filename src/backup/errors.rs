//! Backup-specific error types
//!
//! Backup errors follow the engine error model:
//! - Structured error codes in SITEKEEP_BACKUP_NAME format
//! - Clear severity levels
//! - No silent failures
//!
//! All backup errors are ERROR severity. A failed backup never touches
//! the live site; an archive already written under its final name stays
//! valid even if a later step (permissions, upload) fails.

use std::fmt;
use std::io;
use std::path::Path;

use crate::database::DatabaseError;
use crate::policy::PolicyError;
use crate::runner::RunnerError;

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed but the live system is untouched
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Backup error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupErrorCode {
    /// A required file or directory is missing
    SitekeepBackupPrecondition,
    /// An external command exited non-zero or could not start
    SitekeepBackupCommand,
    /// I/O failure while packaging or moving archives
    SitekeepBackupIo,
    /// Site or settings do not allow the operation
    SitekeepBackupConfig,
}

impl BackupErrorCode {
    /// Returns the stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupErrorCode::SitekeepBackupPrecondition => "SITEKEEP_BACKUP_PRECONDITION",
            BackupErrorCode::SitekeepBackupCommand => "SITEKEEP_BACKUP_COMMAND_FAILED",
            BackupErrorCode::SitekeepBackupIo => "SITEKEEP_BACKUP_IO",
            BackupErrorCode::SitekeepBackupConfig => "SITEKEEP_BACKUP_CONFIG",
        }
    }

    /// Returns the severity level for this error code
    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for BackupErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backup error with full context
#[derive(Debug)]
pub struct BackupError {
    code: BackupErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl BackupError {
    fn new(code: BackupErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    /// A required artifact is missing
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(BackupErrorCode::SitekeepBackupPrecondition, message, None)
    }

    /// An external command failed
    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::new(BackupErrorCode::SitekeepBackupCommand, message, None)
    }

    /// I/O error during backup
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(BackupErrorCode::SitekeepBackupIo, message, Some(source))
    }

    /// I/O error at a specific path
    pub fn io_error_at_path(path: &Path, source: io::Error) -> Self {
        Self::io_error(format!("I/O error at {}", path.display()), source)
    }

    /// Site or settings forbid the operation
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(BackupErrorCode::SitekeepBackupConfig, message, None)
    }

    /// Returns the error code
    pub fn code(&self) -> BackupErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the severity of this error
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Backup errors are never fatal
    pub fn is_fatal(&self) -> bool {
        false
    }
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code,
            self.message
        )?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

impl From<RunnerError> for BackupError {
    fn from(err: RunnerError) -> Self {
        BackupError::command_failed(err.to_string())
    }
}

impl From<PolicyError> for BackupError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::CreateDirectory { path, source }
            | PolicyError::ReadDirectory { path, source } => {
                BackupError::io_error_at_path(&path, source)
            }
            PolicyError::Rename { from, to, source } => BackupError::io_error(
                format!("cannot rename {} to {}", from.display(), to.display()),
                source,
            ),
            other => BackupError::precondition(other.to_string()),
        }
    }
}

impl From<DatabaseError> for BackupError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Command(e) => e.into(),
            DatabaseError::Directory(e) => e.into(),
            DatabaseError::DefaultsFile { path, source } => {
                BackupError::io_error_at_path(&path, source)
            }
            other => BackupError::config(other.to_string()),
        }
    }
}
