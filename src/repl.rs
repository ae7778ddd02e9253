use std::io::{BufRead, Write};

use log::{debug, warn};

use nix::sys::signal::Signal;

use crate::action::{Action, Operand};
use crate::session::{ExecutionState, Outcome, Session};
use crate::target::TraceTarget;
use crate::trace::Error;

pub const DEFAULT_PROMPT: &str = "(sdb) ";

/// Why the interactive loop returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Ended {
    Quit,
    EndOfInput,
    /// The target terminated; the debugger has nothing left to do.
    Exited(Outcome),
}

pub struct Repl<T> {
    session: Session<T>,
    prompt: String,
}

impl<T: TraceTarget> Repl<T> {
    pub fn new(session: Session<T>) -> Self {
        Self {
            session,
            prompt: DEFAULT_PROMPT.to_owned(),
        }
    }

    pub fn with_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn into_session(self) -> Session<T> {
        self.session
    }

    /// Prompts for and executes commands until the operator quits, input
    /// ends, the target terminates or a fatal error occurs.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<Ended, Error> {
        let mut lines = input.lines();

        loop {
            write!(output, "{}", self.prompt)?;
            output.flush()?;

            let line = match lines.next() {
                Some(line) => line?,
                None => {
                    writeln!(output)?;
                    return Ok(Ended::EndOfInput);
                }
            };

            if let Some(ended) = self.execute(&line, &mut output)? {
                return Ok(ended);
            }
        }
    }

    /// Executes a single line of input. Non-fatal errors are reported to
    /// `output` and swallowed.
    pub fn execute<W: Write>(&mut self, line: &str, output: &mut W) -> Result<Option<Ended>, Error> {
        let action = match Action::parse(line) {
            Some(action) => action,
            None => {
                debug!("ignoring {:?}", line);
                return Ok(None);
            }
        };

        let result = match action {
            Action::Quit => return Ok(Some(Ended::Quit)),
            Action::Unknown(command) => {
                writeln!(output, "unknown command: {}", command)?;
                return Ok(None);
            }
            Action::Break(address) => self.session.set_breakpoint(address).map(|_| None),
            Action::Run => {
                if self.session.state() == ExecutionState::NotStarted {
                    writeln!(output, "Continuing")?;
                }
                self.session.run().map(Some)
            }
            Action::Continue => match self.session.step_off_breakpoint() {
                Ok(Some(outcome)) if outcome.is_terminal() => Ok(Some(outcome)),
                Ok(stepped) => {
                    if let Some(outcome) = stepped {
                        report(outcome, output)?;
                    }
                    writeln!(output, "Continuing")?;
                    self.session.proceed().map(Some)
                }
                Err(e) => Err(e),
            },
            Action::Step => self.session.step().map(Some),
            Action::Print(Operand::ProgramCounter) => match self.session.program_counter() {
                Ok(pc) => {
                    writeln!(output, "{:#x}", pc)?;
                    return Ok(None);
                }
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(Some(outcome)) => report(outcome, output),
            Ok(None) => Ok(None),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                if !matches!(
                    e,
                    Error::BreakpointExists(_)
                        | Error::AlreadyRunning
                        | Error::NotRunning
                        | Error::Exited
                ) {
                    warn!("{}", e);
                }
                writeln!(output, "{}", e)?;
                Ok(None)
            }
        }
    }
}

fn report<W: Write>(outcome: Outcome, output: &mut W) -> Result<Option<Ended>, Error> {
    match outcome {
        Outcome::Stopped(Signal::SIGTRAP) => writeln!(output, "stop")?,
        Outcome::Stopped(signal) => {
            writeln!(output, "stop")?;
            writeln!(output, "Program received signal {:?}", signal)?;
        }
        Outcome::Breakpoint(address) => {
            writeln!(output, "stop")?;
            writeln!(output, "Breakpoint at {:#x}", address)?;
        }
        Outcome::Exited { pid, code: 0 } => {
            writeln!(output, "Program exited normally (process {})", pid)?
        }
        Outcome::Exited { pid, code } => {
            writeln!(output, "Program exited with code {} (process {})", code, pid)?
        }
        Outcome::Signaled { pid, signal } => writeln!(
            output,
            "Program terminated with signal {:?} (process {})",
            signal, pid
        )?,
    }

    if outcome.is_terminal() {
        Ok(Some(Ended::Exited(outcome)))
    } else {
        Ok(None)
    }
}
