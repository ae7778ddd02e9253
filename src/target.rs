use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::arch::{RegisterSet, Word, TRAP_SIZE};
use crate::trace::Error;

/// How a traced process came to rest after a resume or step request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stop {
    /// Suspended by `signal`; registers and memory may be inspected.
    Stopped(Signal),
    /// Exited with the given status code.
    Exited(i32),
    /// Killed by `signal`.
    Signaled(Signal),
}

impl Stop {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited(_) | Self::Signaled(_))
    }
}

/// The tracing primitives the debugger core needs from an operating system.
///
/// Memory and register access is only meaningful while the target is stopped;
/// every `resume` or `single_step` must be followed by `wait_for_stop` before
/// the target is touched again.
pub trait TraceTarget {
    fn pid(&self) -> Pid;

    fn attach(&mut self) -> Result<(), Error>;
    fn detach(&mut self) -> Result<(), Error>;
    fn terminate(&mut self) -> Result<(), Error>;

    fn read_word(&mut self, address: Word) -> Result<Word, Error>;
    fn write_word(&mut self, address: Word, value: Word) -> Result<(), Error>;

    fn registers(&mut self) -> Result<RegisterSet, Error>;
    fn set_registers(&mut self, regs: &RegisterSet) -> Result<(), Error>;

    fn resume(&mut self) -> Result<(), Error>;
    fn single_step(&mut self) -> Result<(), Error>;
    fn wait_for_stop(&mut self) -> Result<Stop, Error>;

    fn program_counter(&mut self) -> Result<Word, Error> {
        Ok(self.registers()?.program_counter())
    }

    fn set_program_counter(&mut self, address: Word) -> Result<(), Error> {
        let mut regs = self.registers()?;
        *regs.program_counter_mut() = address;
        self.set_registers(&regs)
    }

    /// Undoes the advance past an executed trap instruction.
    fn decrement_program_counter(&mut self) -> Result<(), Error> {
        let mut regs = self.registers()?;
        *regs.program_counter_mut() = regs.program_counter().wrapping_sub(TRAP_SIZE);
        self.set_registers(&regs)
    }
}
