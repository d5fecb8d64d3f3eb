//! Confirmation gates
//!
//! Destructive restore steps are presented to a `Confirmer` first. A
//! declined confirmation is an ordinary outcome, not an error.
//!
//! - `TerminalConfirmer`: asks the operator; `q` declines
//! - `AutoApprove`: for runs pre-authorised by the `unattended` setting
//! - `ScriptedConfirmer`: fixed answers, records what it was shown

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::observability::{log_event_with_fields, Event};

/// A destructive step awaiting approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Short name of the step
    pub step: &'static str,
    /// Exact actions that will be taken
    pub plan: Vec<String>,
}

impl Confirmation {
    pub fn new(step: &'static str, plan: Vec<String>) -> Self {
        Self { step, plan }
    }
}

/// Decides whether a destructive step may proceed
pub trait Confirmer {
    fn confirm(&self, confirmation: &Confirmation) -> io::Result<bool>;
}

/// Ask `confirmer`, logging the request and any refusal
pub fn request(confirmer: &dyn Confirmer, confirmation: &Confirmation) -> io::Result<bool> {
    log_event_with_fields(Event::ConfirmationRequested, &[("step", confirmation.step)]);
    let approved = confirmer.confirm(confirmation)?;
    if !approved {
        log_event_with_fields(Event::ConfirmationDeclined, &[("step", confirmation.step)]);
    }
    Ok(approved)
}

/// Interactive prompt on the operator's console
///
/// Reads answers from the same handle the command reads its other input
/// from, so a caller that already holds the stdin lock can still prompt.
#[derive(Debug)]
pub struct TerminalConfirmer<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> TerminalConfirmer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    fn ask(
        confirmation: &Confirmation,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> io::Result<bool> {
        writeln!(output, "=> {}:", confirmation.step)?;
        for line in &confirmation.plan {
            writeln!(output, "   {}", line)?;
        }
        write!(output, "Press enter to continue, q to quit: ")?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            // EOF: nobody to approve
            return Ok(false);
        }
        Ok(answer.trim() != "q")
    }
}

impl<R: BufRead, W: Write> Confirmer for TerminalConfirmer<R, W> {
    fn confirm(&self, confirmation: &Confirmation) -> io::Result<bool> {
        let mut input = self.input.borrow_mut();
        let mut output = self.output.borrow_mut();
        Self::ask(confirmation, &mut *input, &mut *output)
    }
}

/// Approves everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Confirmer for AutoApprove {
    fn confirm(&self, _confirmation: &Confirmation) -> io::Result<bool> {
        Ok(true)
    }
}

/// Answers from a fixed script; declines once the script runs out
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: RefCell<VecDeque<bool>>,
    seen: RefCell<Vec<Confirmation>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().copied().collect()),
            seen: RefCell::new(Vec::new()),
        }
    }

    /// Confirmations presented so far
    pub fn seen(&self) -> Vec<Confirmation> {
        self.seen.borrow().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, confirmation: &Confirmation) -> io::Result<bool> {
        self.seen.borrow_mut().push(confirmation.clone());
        Ok(self.answers.borrow_mut().pop_front().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Confirmation {
        Confirmation::new("restore database", vec!["mysql db < db.sql".to_string()])
    }

    #[test]
    fn test_terminal_prompt() {
        let mut output = Vec::new();
        let confirmer = TerminalConfirmer::new("\n".as_bytes(), &mut output);
        assert!(request(&confirmer, &sample()).unwrap());
        drop(confirmer);

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("=> restore database:"));
        assert!(shown.contains("   mysql db < db.sql"));
    }

    #[test]
    fn test_terminal_q_and_eof_decline() {
        let confirmer = TerminalConfirmer::new("yes\nq\n".as_bytes(), io::sink());
        assert!(confirmer.confirm(&sample()).unwrap());
        assert!(!confirmer.confirm(&sample()).unwrap());
        // input exhausted
        assert!(!confirmer.confirm(&sample()).unwrap());
    }

    #[test]
    fn test_scripted_answers_then_decline() {
        let confirmer = ScriptedConfirmer::new(&[true]);
        assert!(request(&confirmer, &sample()).unwrap());
        assert!(!request(&confirmer, &sample()).unwrap());
        assert_eq!(confirmer.seen().len(), 2);
    }

    #[test]
    fn test_auto_approve() {
        assert!(request(&AutoApprove, &sample()).unwrap());
    }
}
