//! Restore-specific error types
//!
//! Restore errors follow the engine error model:
//! - Structured error codes in SITEKEEP_RESTORE_NAME format
//! - Clear severity levels
//! - No silent failures
//!
//! Failures before the database is replaced are ERROR: the live site is
//! untouched. A failure after that point is FATAL: database and web files
//! may no longer match and need operator intervention.

use std::fmt;
use std::io;
use std::path::Path;

use crate::database::DatabaseError;
use crate::policy::PolicyError;
use crate::runner::RunnerError;

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Restore aborted, nothing live was changed
    Error,
    /// Live site left in a mixed state
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Restore error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreErrorCode {
    /// Archive or directory missing
    SitekeepRestorePrecondition,
    /// An external command exited non-zero or could not start
    SitekeepRestoreCommand,
    /// I/O failure during extraction or cleanup
    SitekeepRestoreIo,
    /// Extracted tree does not have the archive layout
    SitekeepRestoreInvalidArchive,
    /// Site or settings do not allow the operation
    SitekeepRestoreConfig,
    /// Failure after the database was replaced
    SitekeepRestorePartialFailure,
}

impl RestoreErrorCode {
    /// Returns the stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreErrorCode::SitekeepRestorePrecondition => "SITEKEEP_RESTORE_PRECONDITION",
            RestoreErrorCode::SitekeepRestoreCommand => "SITEKEEP_RESTORE_COMMAND_FAILED",
            RestoreErrorCode::SitekeepRestoreIo => "SITEKEEP_RESTORE_IO",
            RestoreErrorCode::SitekeepRestoreInvalidArchive => "SITEKEEP_RESTORE_INVALID_ARCHIVE",
            RestoreErrorCode::SitekeepRestoreConfig => "SITEKEEP_RESTORE_CONFIG",
            RestoreErrorCode::SitekeepRestorePartialFailure => "SITEKEEP_RESTORE_PARTIAL_FAILURE",
        }
    }

    /// Returns the severity level for this error code
    pub fn severity(&self) -> Severity {
        match self {
            RestoreErrorCode::SitekeepRestorePartialFailure => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for RestoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Restore error with full context
#[derive(Debug)]
pub struct RestoreError {
    code: RestoreErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl RestoreError {
    fn new(code: RestoreErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    /// A required artifact is missing
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::SitekeepRestorePrecondition, message, None)
    }

    /// An external command failed
    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::SitekeepRestoreCommand, message, None)
    }

    /// I/O error during restore
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(RestoreErrorCode::SitekeepRestoreIo, message, Some(source))
    }

    /// I/O error at a specific path
    pub fn io_error_at_path(path: &Path, source: io::Error) -> Self {
        Self::io_error(format!("I/O error at {}", path.display()), source)
    }

    /// Archive content does not match the expected layout
    pub fn invalid_archive(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::SitekeepRestoreInvalidArchive, message, None)
    }

    /// Archive could not be read at all
    pub fn invalid_archive_with_source(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(
            RestoreErrorCode::SitekeepRestoreInvalidArchive,
            message,
            Some(source),
        )
    }

    /// Site or settings forbid the operation
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::SitekeepRestoreConfig, message, None)
    }

    /// Wrap an error raised after the database was replaced
    pub fn partial_failure(cause: RestoreError) -> Self {
        Self {
            code: RestoreErrorCode::SitekeepRestorePartialFailure,
            message: format!(
                "database restored but web files were not replaced: {}",
                cause.message
            ),
            source: cause.source,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> RestoreErrorCode {
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

    /// True when the live site may be inconsistent
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for RestoreError {
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

impl std::error::Error for RestoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for restore operations
pub type RestoreResult<T> = Result<T, RestoreError>;

impl From<RunnerError> for RestoreError {
    fn from(err: RunnerError) -> Self {
        RestoreError::command_failed(err.to_string())
    }
}

impl From<PolicyError> for RestoreError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::CreateDirectory { path, source }
            | PolicyError::ReadDirectory { path, source } => {
                RestoreError::io_error_at_path(&path, source)
            }
            PolicyError::Rename { from, to, source } => RestoreError::io_error(
                format!("cannot rename {} to {}", from.display(), to.display()),
                source,
            ),
            other => RestoreError::precondition(other.to_string()),
        }
    }
}

impl From<DatabaseError> for RestoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Command(e) => e.into(),
            DatabaseError::Directory(e) => e.into(),
            DatabaseError::DefaultsFile { path, source } => {
                RestoreError::io_error_at_path(&path, source)
            }
            other => RestoreError::config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RestoreErrorCode::SitekeepRestoreInvalidArchive.as_str(),
            "SITEKEEP_RESTORE_INVALID_ARCHIVE"
        );
        assert_eq!(
            RestoreErrorCode::SitekeepRestorePartialFailure.as_str(),
            "SITEKEEP_RESTORE_PARTIAL_FAILURE"
        );
    }

    #[test]
    fn test_only_partial_failure_is_fatal() {
        let codes = [
            RestoreErrorCode::SitekeepRestorePrecondition,
            RestoreErrorCode::SitekeepRestoreCommand,
            RestoreErrorCode::SitekeepRestoreIo,
            RestoreErrorCode::SitekeepRestoreInvalidArchive,
            RestoreErrorCode::SitekeepRestoreConfig,
        ];
        for code in codes {
            assert_eq!(code.severity(), Severity::Error);
        }
        assert_eq!(
            RestoreErrorCode::SitekeepRestorePartialFailure.severity(),
            Severity::Fatal
        );
    }

    #[test]
    fn test_partial_failure_keeps_cause() {
        let cause = RestoreError::io_error(
            "Failed to move web files",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let err = RestoreError::partial_failure(cause);

        assert!(err.is_fatal());
        let display = err.to_string();
        assert!(display.starts_with("[FATAL] SITEKEEP_RESTORE_PARTIAL_FAILURE"));
        assert!(display.contains("Failed to move web files"));
        assert!(display.contains("caused by: denied"));
    }

    #[test]
    fn test_error_display_contains_required_fields() {
        let err = RestoreError::precondition("archive missing");
        let display = format!("{}", err);
        assert!(display.contains("ERROR"));
        assert!(display.contains("SITEKEEP_RESTORE_PRECONDITION"));
        assert!(display.contains("archive missing"));
    }
}
