//! CLI-specific error types
//!
//! Every error reaching the CLI ends the run with exit status 1. The
//! message keeps the code and severity of the subsystem that raised it.

use std::fmt;
use std::io;

use crate::backup::BackupError;
use crate::database::DatabaseError;
use crate::policy::PolicyError;
use crate::registry::RegistryError;
use crate::restore::RestoreError;
use crate::runner::RunnerError;
use crate::settings::SettingsError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Settings file or site table unusable
    ConfigError,
    /// Terminal or file I/O
    IoError,
    /// Invalid argument or operator input
    UsageError,
    /// Process must run as root
    NotRoot,
    /// A backup failed
    BackupFailed,
    /// One or more sites failed during saveall
    BatchFailed,
    /// A restore failed
    RestoreFailed,
    /// An external command failed outside an engine
    CommandFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "SITEKEEP_CLI_CONFIG_ERROR",
            Self::IoError => "SITEKEEP_CLI_IO_ERROR",
            Self::UsageError => "SITEKEEP_CLI_USAGE_ERROR",
            Self::NotRoot => "SITEKEEP_CLI_NOT_ROOT",
            Self::BackupFailed => "SITEKEEP_CLI_BACKUP_FAILED",
            Self::BatchFailed => "SITEKEEP_CLI_SAVEALL_FAILED",
            Self::RestoreFailed => "SITEKEEP_CLI_RESTORE_FAILED",
            Self::CommandFailed => "SITEKEEP_CLI_COMMAND_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Bad argument or answer
    pub fn usage_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::UsageError, msg)
    }

    /// Root privileges required but missing
    pub fn not_root() -> Self {
        Self::new(
            CliErrorCode::NotRoot,
            "runasroot is set: run this command as root",
        )
    }

    /// Summary of a saveall with failed sites
    pub fn batch_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BatchFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<SettingsError> for CliError {
    fn from(e: SettingsError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<RegistryError> for CliError {
    fn from(e: RegistryError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<PolicyError> for CliError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::InvalidTag(_) | PolicyError::MissingDirectory(_) => {
                Self::usage_error(e.to_string())
            }
            other => Self::io_error(other.to_string()),
        }
    }
}

impl From<RunnerError> for CliError {
    fn from(e: RunnerError) -> Self {
        Self::new(CliErrorCode::CommandFailed, e.to_string())
    }
}

impl From<DatabaseError> for CliError {
    fn from(e: DatabaseError) -> Self {
        Self::new(CliErrorCode::CommandFailed, e.to_string())
    }
}

impl From<BackupError> for CliError {
    fn from(e: BackupError) -> Self {
        Self::new(CliErrorCode::BackupFailed, e.to_string())
    }
}

impl From<RestoreError> for CliError {
    fn from(e: RestoreError) -> Self {
        Self::new(CliErrorCode::RestoreFailed, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_display_keeps_inner_code() {
        let err: CliError = RestoreError::precondition("Archive not found: /x").into();
        let display = err.to_string();
        assert!(display.starts_with("SITEKEEP_CLI_RESTORE_FAILED: "));
        assert!(display.contains("SITEKEEP_RESTORE_PRECONDITION"));
    }

    #[test]
    fn test_policy_error_mapping() {
        let err: CliError = PolicyError::InvalidTag("a b".into()).into();
        assert_eq!(err.code(), CliErrorCode::UsageError);

        let err: CliError = PolicyError::MissingDirectory(PathBuf::from("/usb")).into();
        assert_eq!(err.code(), CliErrorCode::UsageError);
    }

    #[test]
    fn test_settings_error_is_config() {
        let err: CliError = SettingsError::MissingSection("wm_config").into();
        assert_eq!(err.code_str(), "SITEKEEP_CLI_CONFIG_ERROR");
    }
}
