//! In-process runner for dry runs and tests
//!
//! Records every command instead of spawning it. Redirections are
//! emulated: a command with a stdout target gets a short dump written
//! there, a command with a stdin source has that file's content captured.

use std::cell::RefCell;
use std::fs;

use super::{CommandRunner, RunnerError, RunnerResult, ShellCommand};

/// Runner that records commands and emulates their redirections
#[derive(Debug)]
pub struct RecordingRunner {
    commands: RefCell<Vec<ShellCommand>>,
    stdin_payloads: RefCell<Vec<String>>,
    failing: Vec<String>,
    probe_result: bool,
    capture_output: String,
    write_output: bool,
    simulate: bool,
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            commands: RefCell::new(Vec::new()),
            stdin_payloads: RefCell::new(Vec::new()),
            failing: Vec::new(),
            probe_result: true,
            capture_output: String::new(),
            write_output: true,
            simulate: false,
        }
    }

    /// Every command whose program is `program` exits with status 1
    pub fn failing(mut self, program: &str) -> Self {
        self.failing.push(program.to_string());
        self
    }

    /// Result reported by `probe`
    pub fn with_probe(mut self, result: bool) -> Self {
        self.probe_result = result;
        self
    }

    /// Output returned by `capture`
    pub fn with_capture(mut self, output: &str) -> Self {
        self.capture_output = output.to_string();
        self
    }

    /// Commands succeed without writing their stdout target
    pub fn without_output(mut self) -> Self {
        self.write_output = false;
        self
    }

    /// Report `simulating() == true`
    pub fn simulated(mut self) -> Self {
        self.simulate = true;
        self
    }

    /// Commands in the order they were issued
    pub fn commands(&self) -> Vec<ShellCommand> {
        self.commands.borrow().clone()
    }

    /// Commands rendered as command lines
    pub fn rendered(&self) -> Vec<String> {
        self.commands.borrow().iter().map(|c| c.to_string()).collect()
    }

    /// Contents fed to commands through stdin, in order
    pub fn stdin_payloads(&self) -> Vec<String> {
        self.stdin_payloads.borrow().clone()
    }

    /// Commands whose program is `program`
    pub fn issued(&self, program: &str) -> Vec<ShellCommand> {
        self.commands
            .borrow()
            .iter()
            .filter(|c| c.program == program)
            .cloned()
            .collect()
    }

    fn record(&self, command: &ShellCommand) -> RunnerResult<()> {
        self.commands.borrow_mut().push(command.clone());
        if self.failing.contains(&command.program) {
            return Err(RunnerError::ExitStatus {
                command: command.to_string(),
                code: Some(1),
            });
        }
        Ok(())
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &ShellCommand) -> RunnerResult<()> {
        self.record(command)?;
        if self.simulate {
            return Ok(());
        }
        if let Some(path) = &command.stdin {
            let content = fs::read_to_string(path).map_err(|source| RunnerError::Redirect {
                path: path.clone(),
                source,
            })?;
            self.stdin_payloads.borrow_mut().push(content);
        }
        if let (Some(path), true) = (&command.stdout, self.write_output) {
            let subject = command.args.last().map(String::as_str).unwrap_or_default();
            fs::write(path, format!("-- dump of {}\n", subject)).map_err(|source| {
                RunnerError::Redirect {
                    path: path.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    fn probe(&self, command: &ShellCommand) -> RunnerResult<bool> {
        self.commands.borrow_mut().push(command.clone());
        Ok(self.probe_result && !self.failing.contains(&command.program))
    }

    fn capture(&self, command: &ShellCommand) -> RunnerResult<String> {
        self.record(command)?;
        Ok(self.capture_output.clone())
    }

    fn simulating(&self) -> bool {
        self.simulate
    }
}
