//! Command Runner
//!
//! Every external effect of the engines (database dump and restore, remote
//! copy, ownership and permission changes) goes through a `CommandRunner`.
//! Commands are executed directly, never through a shell; redirections are
//! files attached to the child's stdin/stdout.
//!
//! Runner options are fixed at construction:
//! - `verbose` logs every command at INFO instead of TRACE
//! - `simulate` turns every call into a no-op that reports success

mod errors;
mod recording;

pub use errors::{RunnerError, RunnerResult};
pub use recording::RecordingRunner;

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::observability::{log_event_with_fields, Event, Logger};

/// An external command with optional file redirections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed the file to the command's stdin
    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    /// Write the command's stdout to the file, truncating it
    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    fn to_command(&self) -> RunnerResult<Command> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(path) = &self.stdin {
            command.stdin(Stdio::from(open_redirect(path, false)?));
        }
        if let Some(path) = &self.stdout {
            command.stdout(Stdio::from(open_redirect(path, true)?));
        }
        Ok(command)
    }
}

fn open_redirect(path: &Path, write: bool) -> RunnerResult<File> {
    let file = if write {
        File::create(path)
    } else {
        File::open(path)
    };
    file.map_err(|source| RunnerError::Redirect {
        path: path.to_path_buf(),
        source,
    })
}

fn quote(word: &str) -> String {
    if word.is_empty() || word.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", word.replace('\'', "'\\''"))
    } else {
        word.to_string()
    }
}

/// Renders the command the way an operator would type it
impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        if let Some(path) = &self.stdin {
            write!(f, " < {}", quote(&path.display().to_string()))?;
        }
        if let Some(path) = &self.stdout {
            write!(f, " > {}", quote(&path.display().to_string()))?;
        }
        Ok(())
    }
}

/// Executes external commands on behalf of the engines
pub trait CommandRunner {
    /// Run to completion; a non-zero exit is an error
    fn run(&self, command: &ShellCommand) -> RunnerResult<()>;

    /// Run to completion and report whether it exited successfully
    fn probe(&self, command: &ShellCommand) -> RunnerResult<bool>;

    /// Run to completion and return its stdout; a non-zero exit is an error
    fn capture(&self, command: &ShellCommand) -> RunnerResult<String>;

    /// True when external effects and filesystem mutations are skipped
    fn simulating(&self) -> bool {
        false
    }
}

/// Runner construction options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerOptions {
    pub verbose: bool,
    pub simulate: bool,
}

/// Runs commands as child processes of this one
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    options: RunnerOptions,
}

impl SystemRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> RunnerOptions {
        self.options
    }

    /// Log the command; returns false when it must not actually run
    fn announce(&self, command: &ShellCommand) -> bool {
        let rendered = command.to_string();
        if self.options.verbose {
            Logger::info(Event::CommandIssued.as_str(), &[("command", &rendered)]);
        } else {
            log_event_with_fields(Event::CommandIssued, &[("command", &rendered)]);
        }
        if self.options.simulate {
            log_event_with_fields(Event::StepSimulated, &[("command", &rendered)]);
            return false;
        }
        true
    }

    fn spawn_error(command: &ShellCommand, source: std::io::Error) -> RunnerError {
        RunnerError::Spawn {
            command: command.to_string(),
            source,
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ShellCommand) -> RunnerResult<()> {
        if !self.announce(command) {
            return Ok(());
        }
        let status = command
            .to_command()?
            .status()
            .map_err(|e| Self::spawn_error(command, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(RunnerError::ExitStatus {
                command: command.to_string(),
                code: status.code(),
            })
        }
    }

    fn probe(&self, command: &ShellCommand) -> RunnerResult<bool> {
        if !self.announce(command) {
            return Ok(true);
        }
        let status = command
            .to_command()?
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| Self::spawn_error(command, e))?;
        Ok(status.success())
    }

    fn capture(&self, command: &ShellCommand) -> RunnerResult<String> {
        if !self.announce(command) {
            return Ok(String::new());
        }
        let output = command
            .to_command()?
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| Self::spawn_error(command, e))?;
        if !output.status.success() {
            return Err(RunnerError::ExitStatus {
                command: command.to_string(),
                code: output.status.code(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn simulating(&self) -> bool {
        self.options.simulate
    }
}

/// Whether the process runs with uid 0; assumed when simulating
pub fn running_as_root(runner: &dyn CommandRunner) -> RunnerResult<bool> {
    if runner.simulating() {
        return Ok(true);
    }
    let uid = runner.capture(&ShellCommand::new("id").arg("-u"))?;
    Ok(uid.trim() == "0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_display_renders_redirects_and_quotes() {
        let cmd = ShellCommand::new("mysql")
            .arg("--defaults-file=/tmp/.abc")
            .arg("-e")
            .arg("SELECT 1")
            .stdin_from("/tmp/site.sql");
        assert_eq!(
            cmd.to_string(),
            "mysql --defaults-file=/tmp/.abc -e 'SELECT 1' < /tmp/site.sql"
        );
    }

    #[test]
    fn test_simulate_is_noop() {
        let runner = SystemRunner::new(RunnerOptions {
            verbose: false,
            simulate: true,
        });
        let cmd = ShellCommand::new("definitely-not-a-real-program-sitekeep");

        assert!(runner.run(&cmd).is_ok());
        assert!(runner.probe(&cmd).unwrap());
        assert_eq!(runner.capture(&cmd).unwrap(), "");
        assert!(runner.simulating());
        assert!(running_as_root(&runner).unwrap());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let runner = SystemRunner::default();
        let cmd = ShellCommand::new("definitely-not-a-real-program-sitekeep");
        assert!(matches!(runner.run(&cmd), Err(RunnerError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_and_redirects() {
        let dir = TempDir::new().unwrap();
        let runner = SystemRunner::default();

        let out = dir.path().join("out.txt");
        runner
            .run(&ShellCommand::new("echo").arg("hello").stdout_to(&out))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello\n");

        let copied = dir.path().join("copied.txt");
        runner
            .run(&ShellCommand::new("cat").stdin_from(&out).stdout_to(&copied))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&copied).unwrap(), "hello\n");

        assert!(matches!(
            runner.run(&ShellCommand::new("false")),
            Err(RunnerError::ExitStatus { .. })
        ));
        assert!(!runner.probe(&ShellCommand::new("false")).unwrap());
        assert_eq!(runner.capture(&ShellCommand::new("echo").arg("x")).unwrap(), "x\n");
    }

    #[test]
    fn test_missing_stdin_is_redirect_error() {
        let runner = SystemRunner::default();
        let cmd = ShellCommand::new("cat").stdin_from("/nonexistent/sitekeep/input.sql");
        assert!(matches!(runner.run(&cmd), Err(RunnerError::Redirect { .. })));
    }
}
