//! # Command Runner Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for command execution
pub type RunnerResult<T> = Result<T, RunnerError>;

/// External command failures. None of them are retried.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("cannot start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("status {}", c)))]
    ExitStatus { command: String, code: Option<i32> },

    #[error("cannot open redirect target {path}: {source}")]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RunnerError {
    /// The rendered command line, when known
    pub fn command(&self) -> Option<&str> {
        match self {
            RunnerError::Spawn { command, .. } | RunnerError::ExitStatus { command, .. } => {
                Some(command)
            }
            RunnerError::Redirect { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_display() {
        let err = RunnerError::ExitStatus {
            command: "mysqldump db".into(),
            code: Some(2),
        };
        assert_eq!(err.to_string(), "'mysqldump db' exited with status 2");

        let killed = RunnerError::ExitStatus {
            command: "scp a b".into(),
            code: None,
        };
        assert!(killed.to_string().ends_with("a signal"));
        assert_eq!(killed.command(), Some("scp a b"));
    }
}
