use log::{debug, info, warn};

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::arch::Word;
use crate::breakpoint::Breakpoint;
use crate::target::{Stop, TraceTarget};
use crate::trace::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    NotStarted,
    Running,
    Exited,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// What the target did in response to a run, continue or step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stopped(Signal),
    Breakpoint(Word),
    Exited { pid: Pid, code: i32 },
    Signaled { pid: Pid, signal: Signal },
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited { .. } | Self::Signaled { .. })
    }
}

/// Debugging state for a single traced process: at most one breakpoint and
/// the execution state.
#[derive(Debug)]
pub struct Session<T> {
    target: T,
    breakpoint: Option<Breakpoint>,
    state: ExecutionState,
}

impl<T: TraceTarget> Session<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            breakpoint: None,
            state: ExecutionState::default(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.target.pid()
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn breakpoint(&self) -> Option<&Breakpoint> {
        self.breakpoint.as_ref()
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }

    pub fn set_breakpoint(&mut self, address: Word) -> Result<&Breakpoint, Error> {
        if self.state == ExecutionState::Exited {
            return Err(Error::Exited);
        }

        if let Some(bp) = self.breakpoint.as_ref().filter(|bp| bp.is_armed()) {
            return Err(Error::BreakpointExists(bp.address()));
        }

        let bp = Breakpoint::arm(&mut self.target, address)?;
        info!("breakpoint set at {:#x}", address);

        Ok(self.breakpoint.insert(bp))
    }

    pub fn run(&mut self) -> Result<Outcome, Error> {
        match self.state {
            ExecutionState::NotStarted => self.resume(),
            ExecutionState::Running => Err(Error::AlreadyRunning),
            ExecutionState::Exited => Err(Error::Exited),
        }
    }

    pub fn cont(&mut self) -> Result<Outcome, Error> {
        match self.step_off_breakpoint()? {
            Some(outcome) if outcome.is_terminal() => Ok(outcome),
            _ => self.proceed(),
        }
    }

    /// When parked on the breakpoint, executes the instruction under it and
    /// inserts the trap again. Returns the outcome of that step, or `None`
    /// when the target is elsewhere.
    pub fn step_off_breakpoint(&mut self) -> Result<Option<Outcome>, Error> {
        self.check_running()?;

        if self.parked_on_breakpoint()? {
            self.step_over_breakpoint().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Resumes from wherever the target is stopped, without stepping off the
    /// breakpoint first.
    pub fn proceed(&mut self) -> Result<Outcome, Error> {
        self.check_running()?;
        self.resume()
    }

    pub fn step(&mut self) -> Result<Outcome, Error> {
        self.check_running()?;

        if self.parked_on_breakpoint()? {
            self.step_over_breakpoint()
        } else {
            self.single_step()
        }
    }

    pub fn program_counter(&mut self) -> Result<Word, Error> {
        self.check_running()?;
        self.target.program_counter()
    }

    /// Releases the target: the trap is removed, the process detached and,
    /// if `terminate` is set, sent `SIGTERM`.
    pub fn finish(&mut self, terminate: bool) -> Result<(), Error> {
        if self.state == ExecutionState::Exited {
            return Ok(());
        }

        if let Some(bp) = self.breakpoint.as_mut().filter(|bp| bp.is_armed()) {
            match bp.disarm(&mut self.target) {
                Ok(()) => bp.set_armed(false),
                Err(e) => warn!("leaving trap at {:#x} in place: {}", bp.address(), e),
            }
        }

        let detached = self.target.detach();

        if terminate {
            self.target.terminate()?;
        }

        detached
    }

    fn check_running(&self) -> Result<(), Error> {
        match self.state {
            ExecutionState::Running => Ok(()),
            ExecutionState::NotStarted => Err(Error::NotRunning),
            ExecutionState::Exited => Err(Error::Exited),
        }
    }

    fn parked_on_breakpoint(&mut self) -> Result<bool, Error> {
        match self.breakpoint.as_ref().map(Breakpoint::address) {
            Some(address) => Ok(self.target.program_counter()? == address),
            None => Ok(false),
        }
    }

    /// Runs until the target traps or terminates. A stop just past the armed
    /// breakpoint is a hit: the original code is restored and the program
    /// counter moved back onto it.
    fn resume(&mut self) -> Result<Outcome, Error> {
        self.target.resume()?;
        self.state = ExecutionState::Running;

        let outcome = self.wait()?;
        if outcome.is_terminal() {
            return Ok(outcome);
        }

        if let Some(bp) = self.breakpoint.as_mut().filter(|bp| bp.is_armed()) {
            let pc = self.target.program_counter()?;
            if bp.is_hit_at(pc) {
                info!("breakpoint hit at {:#x}", bp.address());

                bp.disarm(&mut self.target)?;
                bp.set_armed(false);
                self.target.decrement_program_counter()?;

                return Ok(Outcome::Breakpoint(bp.address()));
            }
        }

        Ok(outcome)
    }

    fn single_step(&mut self) -> Result<Outcome, Error> {
        self.target.single_step()?;
        self.wait()
    }

    /// Executes the instruction under the breakpoint with its original bytes
    /// in place, then inserts the trap again.
    fn step_over_breakpoint(&mut self) -> Result<Outcome, Error> {
        let original = match self.breakpoint.clone() {
            Some(bp) => bp,
            None => return self.single_step(),
        };

        debug!("stepping over breakpoint at {:#x}", original.address());

        if original.is_armed() {
            original.disarm(&mut self.target)?;
            if let Some(bp) = self.breakpoint.as_mut() {
                bp.set_armed(false);
            }
        }

        let outcome = self.single_step()?;
        if outcome.is_terminal() {
            return Ok(outcome);
        }

        let rearmed = Breakpoint::arm(&mut self.target, original.address())?;
        if rearmed.saved_word() != original.saved_word() {
            // leave the code as the target rewrote it, without our trap
            rearmed.disarm(&mut self.target)?;
            return Err(Error::BreakpointCorrupted {
                address: original.address(),
                expected: original.saved_word(),
                found: rearmed.saved_word(),
            });
        }

        self.breakpoint = Some(rearmed);
        Ok(outcome)
    }

    fn wait(&mut self) -> Result<Outcome, Error> {
        let pid = self.target.pid();

        let outcome = match self.target.wait_for_stop()? {
            Stop::Stopped(signal) => return Ok(Outcome::Stopped(signal)),
            Stop::Exited(code) => Outcome::Exited { pid, code },
            Stop::Signaled(signal) => Outcome::Signaled { pid, signal },
        };

        info!("process {} terminated: {:?}", pid, outcome);

        self.state = ExecutionState::Exited;
        if let Some(bp) = self.breakpoint.as_mut() {
            bp.set_armed(false);
        }

        Ok(outcome)
    }
}
